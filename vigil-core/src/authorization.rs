//! Permission-to-authorization-level compiler
//!
//! Pure functions translating the named capability model into the
//! protocol's flat numeric hierarchy and back. Nothing here performs I/O
//! or fails; validation returns accumulated violations instead of erroring
//! on the first problem.

use thiserror::Error;

use crate::models::{
    Capability, CapabilitySet, LevelDocument, FULL_CONTROL_LEVEL, MODERATOR_LEVEL,
};

/// A single problem found by [`validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("level {actual} is below the required level {required} for the requested capabilities")]
    LevelBelowRequirement { required: i64, actual: i64 },

    #[error("administrator requires full control (level 100), got {actual}")]
    AdministratorRequiresFullControl { actual: i64 },

    #[error("manage_roles requires at least moderator level 50, got {actual}")]
    ManageRolesBelowModerator { actual: i64 },
}

/// Minimum authorization level sufficient for every enabled capability.
///
/// Soft capabilities contribute nothing; an empty or all-soft set compiles
/// to `0`.
#[must_use]
pub fn required_level(capabilities: CapabilitySet) -> i64 {
    capabilities
        .iter()
        .flat_map(|c| c.rules().iter().map(|r| r.level))
        .max()
        .unwrap_or(0)
}

/// Compile a capability set into a complete authorization-level document.
///
/// Starts from `existing` when present, otherwise from a fresh document
/// whose `users_default` is `baseline`. Every rule of every enabled
/// capability is overlaid onto the document; colliding action keys keep the
/// maximum level. Deterministic: equal inputs produce equal documents.
#[must_use]
pub fn generate_level_document(
    capabilities: CapabilitySet,
    baseline: i64,
    existing: Option<&LevelDocument>,
) -> LevelDocument {
    let mut document = existing
        .cloned()
        .unwrap_or_else(|| LevelDocument::with_users_default(baseline));

    for capability in capabilities.iter() {
        for rule in capability.rules() {
            document.raise_action_level(rule.action, rule.durable_state, rule.level);
        }
    }

    document
}

/// Required level for one capability against a concrete document.
///
/// The document's per-action entry wins over the static table when present.
/// Soft capabilities require nothing.
#[must_use]
pub fn enforcement_level(capability: Capability, document: &LevelDocument) -> i64 {
    capability
        .rules()
        .iter()
        .map(|rule| {
            document
                .action_level(rule.action, rule.durable_state)
                .unwrap_or(rule.level)
        })
        .max()
        .unwrap_or(0)
}

/// Recompute the capability set a user at `level` effectively holds.
///
/// A capability is granted iff the level clears every one of its rules,
/// honoring per-action overrides from `document`; soft capabilities are
/// vacuously granted.
#[must_use]
pub fn effective_capabilities(level: i64, document: Option<&LevelDocument>) -> CapabilitySet {
    Capability::ALL
        .into_iter()
        .filter(|capability| {
            capability.rules().iter().all(|rule| {
                let required = document
                    .and_then(|d| d.action_level(rule.action, rule.durable_state))
                    .unwrap_or(rule.level);
                level >= required
            })
        })
        .collect()
}

/// Check that `level` is coherent with the requested capability set.
///
/// Accumulates every violation instead of stopping at the first. Two hard
/// rules apply on top of the compiled minimum: `administrator` demands full
/// control, and `manage_roles` demands at least moderator level.
#[must_use]
pub fn validate(capabilities: CapabilitySet, level: i64) -> Vec<Violation> {
    let mut violations = Vec::new();

    let required = required_level(capabilities);
    if level < required {
        violations.push(Violation::LevelBelowRequirement {
            required,
            actual: level,
        });
    }

    if capabilities.has(Capability::Administrator) && level != FULL_CONTROL_LEVEL {
        violations.push(Violation::AdministratorRequiresFullControl { actual: level });
    }

    if capabilities.has(Capability::ManageRoles) && level < MODERATOR_LEVEL {
        violations.push(Violation::ManageRolesBelowModerator { actual: level });
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_LEVEL;

    fn set(capabilities: &[Capability]) -> CapabilitySet {
        capabilities.iter().copied().collect()
    }

    #[test]
    fn test_required_level_empty_set() {
        assert_eq!(required_level(CapabilitySet::empty()), 0);
    }

    #[test]
    fn test_required_level_soft_only() {
        assert_eq!(required_level(set(&[Capability::Speak, Capability::UseVideo])), 0);
    }

    #[test]
    fn test_required_level_takes_maximum() {
        let caps = set(&[Capability::SendMessages, Capability::BanMembers]);
        assert_eq!(required_level(caps), MODERATOR_LEVEL);

        let caps = set(&[Capability::BanMembers, Capability::Administrator]);
        assert_eq!(required_level(caps), FULL_CONTROL_LEVEL);
    }

    #[test]
    fn test_computed_minimum_is_sufficient_for_itself() {
        // For all capability sets built from the templates and a few
        // hand-picked ones, validate(C, required_level(C)) never reports a
        // plain level violation
        let candidates = [
            CapabilitySet::empty(),
            CapabilitySet::new(CapabilitySet::DEFAULT_MEMBER),
            CapabilitySet::new(CapabilitySet::MODERATOR),
            CapabilitySet::new(CapabilitySet::ADMINISTRATOR),
            set(&[Capability::KickMembers]),
            set(&[Capability::Speak, Capability::DeleteMessages]),
        ];
        for caps in candidates {
            let level = required_level(caps);
            let violations = validate(caps, level);
            assert!(
                !violations
                    .iter()
                    .any(|v| matches!(v, Violation::LevelBelowRequirement { .. })),
                "level {level} insufficient for its own set {caps:?}: {violations:?}"
            );
        }
    }

    #[test]
    fn test_effective_round_trip_preserves_gated_capabilities() {
        let candidates = [
            CapabilitySet::new(CapabilitySet::DEFAULT_MEMBER),
            CapabilitySet::new(CapabilitySet::MODERATOR),
            CapabilitySet::new(CapabilitySet::ADMINISTRATOR),
            set(&[Capability::BanMembers, Capability::KickMembers]),
        ];
        for caps in candidates {
            let level = required_level(caps);
            let effective = effective_capabilities(level, None);
            for capability in caps.iter().filter(|c| !c.is_soft()) {
                assert!(
                    effective.has(capability),
                    "{capability} lost in round trip at level {level}"
                );
            }
        }
    }

    #[test]
    fn test_effective_capabilities_at_zero() {
        let effective = effective_capabilities(DEFAULT_LEVEL, None);
        assert!(effective.has(Capability::SendMessages));
        assert!(effective.has(Capability::ViewRoom));
        // Soft capabilities are vacuously granted
        assert!(effective.has(Capability::Speak));
        assert!(!effective.has(Capability::BanMembers));
        assert!(!effective.has(Capability::Administrator));
    }

    #[test]
    fn test_effective_capabilities_honors_document_override() {
        let mut document = LevelDocument::default();
        // Room raised the bar for sending messages
        document.raise_action_level("room.message.send", false, 25);

        let effective = effective_capabilities(0, Some(&document));
        assert!(!effective.has(Capability::SendMessages));

        let effective = effective_capabilities(25, Some(&document));
        assert!(effective.has(Capability::SendMessages));
    }

    #[test]
    fn test_generate_document_fresh() {
        let caps = set(&[Capability::BanMembers, Capability::PinMessages]);
        let document = generate_level_document(caps, 0, None);

        assert_eq!(document.action_level("room.member.ban", false), Some(MODERATOR_LEVEL));
        assert_eq!(document.action_level("room.pins", true), Some(MODERATOR_LEVEL));
        assert_eq!(document.users_default, 0);
    }

    #[test]
    fn test_generate_document_keeps_existing_maximum() {
        let mut existing = LevelDocument::default();
        existing.raise_action_level("room.member.ban", false, 75);

        let caps = set(&[Capability::BanMembers]);
        let document = generate_level_document(caps, 0, Some(&existing));
        assert_eq!(document.action_level("room.member.ban", false), Some(75));
    }

    #[test]
    fn test_generate_document_is_deterministic() {
        let caps = CapabilitySet::new(CapabilitySet::MODERATOR);
        let a = generate_level_document(caps, 0, None);
        let b = generate_level_document(caps, 0, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_validate_accumulates_violations() {
        let caps = set(&[Capability::Administrator, Capability::ManageRoles]);
        let violations = validate(caps, 10);

        assert_eq!(violations.len(), 3);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::LevelBelowRequirement { required: 100, actual: 10 })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::AdministratorRequiresFullControl { actual: 10 })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::ManageRolesBelowModerator { actual: 10 })));
    }

    #[test]
    fn test_validate_administrator_demands_exactly_full_control() {
        let caps = set(&[Capability::Administrator]);
        assert!(validate(caps, FULL_CONTROL_LEVEL).is_empty());
        // Even above-minimum levels other than 100 do not exist in the
        // model, but a sub-100 admin is rejected outright
        assert!(!validate(caps, 99).is_empty());
    }

    #[test]
    fn test_enforcement_level_prefers_document() {
        let mut document = LevelDocument::default();
        assert_eq!(enforcement_level(Capability::BanMembers, &document), MODERATOR_LEVEL);

        document.raise_action_level("room.member.ban", false, 80);
        assert_eq!(enforcement_level(Capability::BanMembers, &document), 80);
    }
}
