//! Named roles
//!
//! Roles give human-readable names, colors and icons to authorization
//! levels. The whole registry for a room is one versioned document stored
//! in account data; the live level map stays the ground truth for who
//! actually holds which level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::capability::{CapabilitySet, DEFAULT_LEVEL, FULL_CONTROL_LEVEL, MODERATOR_LEVEL};
use super::id::RoleId;

/// Current document schema version
pub const ROLE_DOCUMENT_VERSION: u32 = 1;

/// Maximum role name length in characters
pub const MAX_ROLE_NAME_LEN: usize = 32;

const fn current_version() -> u32 {
    ROLE_DOCUMENT_VERSION
}

/// A named role mapped onto an authorization level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,

    /// Display color (0xRRGGBB)
    pub color: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Authorization level members of this role hold
    pub level: i64,

    /// Capabilities the role grants
    pub capabilities: CapabilitySet,

    /// Best-effort counter; ground truth is the live level map
    #[serde(default)]
    pub member_count: u32,

    /// Dense 1-based presentation ordering
    pub position: u32,

    /// Exactly one role per room carries this flag; it cannot be deleted
    #[serde(default)]
    pub is_default: bool,

    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for creating a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    pub color: u32,
    #[serde(default)]
    pub icon: Option<String>,
    pub level: i64,
    /// Derived from the closest-level template when omitted
    #[serde(default)]
    pub capabilities: Option<CapabilitySet>,
}

/// Partial update for an existing role; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub level: Option<i64>,
    #[serde(default)]
    pub capabilities: Option<CapabilitySet>,
}

/// Validate a role name: non-empty, at most 32 characters, no '@'
pub fn validate_role_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Role name cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_ROLE_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "Role name cannot exceed {MAX_ROLE_NAME_LEN} characters"
        )));
    }
    if trimmed.contains('@') {
        return Err(Error::InvalidInput("Role name cannot contain '@'".to_string()));
    }
    Ok(())
}

/// Capability template for a role created without an explicit set.
///
/// Picks the template whose level is closest to the role's level; ties go
/// to the less privileged template.
#[must_use]
pub fn template_for_level(level: i64) -> CapabilitySet {
    const TEMPLATES: [(i64, u64); 3] = [
        (DEFAULT_LEVEL, CapabilitySet::DEFAULT_MEMBER),
        (MODERATOR_LEVEL, CapabilitySet::MODERATOR),
        (FULL_CONTROL_LEVEL, CapabilitySet::ADMINISTRATOR),
    ];

    let mut best = TEMPLATES[0];
    for candidate in TEMPLATES {
        if (candidate.0 - level).abs() < (best.0 - level).abs() {
            best = candidate;
        }
    }
    CapabilitySet::new(best.1)
}

/// The role registry for one room, persisted as a single account document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDocument {
    /// Schema version; drift is logged, not fatal
    #[serde(default = "current_version")]
    pub version: u32,

    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Default for RoleDocument {
    fn default() -> Self {
        Self {
            version: ROLE_DOCUMENT_VERSION,
            roles: Vec::new(),
        }
    }
}

impl RoleDocument {
    /// Fresh registry seeded with the undeletable default role
    #[must_use]
    pub fn seeded() -> Self {
        Self {
            version: ROLE_DOCUMENT_VERSION,
            roles: vec![Role {
                id: RoleId::new(),
                name: "everyone".to_string(),
                color: 0x9E_9E9E,
                icon: None,
                level: DEFAULT_LEVEL,
                capabilities: CapabilitySet::new(CapabilitySet::DEFAULT_MEMBER),
                member_count: 0,
                position: 1,
                is_default: true,
                created_at: Utc::now(),
            }],
        }
    }

    #[must_use]
    pub fn find(&self, id: &RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| &r.id == id)
    }

    pub fn find_mut(&mut self, id: &RoleId) -> Option<&mut Role> {
        self.roles.iter_mut().find(|r| &r.id == id)
    }

    /// Case-insensitive name collision check, optionally excluding one role
    #[must_use]
    pub fn name_taken(&self, name: &str, exclude: Option<&RoleId>) -> bool {
        let lowered = name.trim().to_lowercase();
        self.roles
            .iter()
            .filter(|r| exclude != Some(&r.id))
            .any(|r| r.name.to_lowercase() == lowered)
    }

    /// Restore the dense `1..=N` position invariant, preserving the current
    /// relative order. Safe after deletions anywhere in the list.
    pub fn renumber_positions(&mut self) {
        self.roles.sort_by_key(|r| r.position);
        for (index, role) in self.roles.iter_mut().enumerate() {
            role.position = index as u32 + 1;
        }
    }

    /// Decode a stored document, tolerating shape drift
    #[must_use]
    pub fn decode(value: serde_json::Value) -> Self {
        match serde_json::from_value::<Self>(value) {
            Ok(doc) => {
                if doc.version != ROLE_DOCUMENT_VERSION {
                    tracing::warn!(
                        found = doc.version,
                        expected = ROLE_DOCUMENT_VERSION,
                        "role document version drift"
                    );
                }
                doc
            }
            Err(e) => {
                tracing::warn!("malformed role document, reseeding: {e}");
                Self::seeded()
            }
        }
    }

    /// Encode for storage
    #[must_use]
    pub fn encode(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}
