//! Authorization-level document
//!
//! The protocol stores one flat numeric document per room: a default level,
//! per-user overrides and per-action minimums. This module owns the typed,
//! versioned shape plus the read-modify-write helpers; all mutation goes
//! through functions returning new values or explicit setters, never ad-hoc
//! merging of untyped JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::id::UserId;

/// Current document schema version
pub const LEVEL_DOCUMENT_VERSION: u32 = 1;

const fn current_version() -> u32 {
    LEVEL_DOCUMENT_VERSION
}

/// Per-room authorization-level document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDocument {
    /// Schema version; drift is logged, not fatal
    #[serde(default = "current_version")]
    pub version: u32,

    /// Level assigned to users with no explicit entry
    #[serde(default)]
    pub users_default: i64,

    /// Level required for actions with no explicit entry
    #[serde(default)]
    pub actions_default: i64,

    /// Per-user level overrides
    #[serde(default)]
    pub users: BTreeMap<String, i64>,

    /// Minimum level per ephemeral action key
    #[serde(default)]
    pub actions: BTreeMap<String, i64>,

    /// Minimum level per durable-state action key
    #[serde(default)]
    pub state_actions: BTreeMap<String, i64>,
}

impl Default for LevelDocument {
    fn default() -> Self {
        Self {
            version: LEVEL_DOCUMENT_VERSION,
            users_default: 0,
            actions_default: 0,
            users: BTreeMap::new(),
            actions: BTreeMap::new(),
            state_actions: BTreeMap::new(),
        }
    }
}

impl LevelDocument {
    /// Fresh document with the given default user level
    #[must_use]
    pub fn with_users_default(users_default: i64) -> Self {
        Self {
            users_default,
            ..Self::default()
        }
    }

    /// Effective level for a user, falling back to `users_default`
    #[must_use]
    pub fn user_level(&self, user: &UserId) -> i64 {
        self.users
            .get(user.as_str())
            .copied()
            .unwrap_or(self.users_default)
    }

    /// Explicit minimum level for an action key, if the document carries one
    #[must_use]
    pub fn action_level(&self, action: &str, durable_state: bool) -> Option<i64> {
        if durable_state {
            self.state_actions.get(action).copied()
        } else {
            self.actions.get(action).copied()
        }
    }

    /// Set a user's level. Setting back to `users_default` drops the entry
    /// so the map stays minimal.
    pub fn set_user_level(&mut self, user: &UserId, level: i64) {
        if level == self.users_default {
            self.users.remove(user.as_str());
        } else {
            self.users.insert(user.as_str().to_string(), level);
        }
    }

    /// Users currently mapped to exactly `level` via an explicit entry
    #[must_use]
    pub fn users_at_level(&self, level: i64) -> Vec<UserId> {
        self.users
            .iter()
            .filter(|(_, l)| **l == level)
            .map(|(u, _)| UserId::from_string(u.clone()))
            .collect()
    }

    /// Overlay an action minimum, keeping the maximum on collision
    pub fn raise_action_level(&mut self, action: &str, durable_state: bool, level: i64) {
        let map = if durable_state {
            &mut self.state_actions
        } else {
            &mut self.actions
        };
        map.entry(action.to_string())
            .and_modify(|existing| *existing = (*existing).max(level))
            .or_insert(level);
    }

    /// Decode a stored document, tolerating shape drift.
    ///
    /// Unknown fields are dropped; a version mismatch is logged and the
    /// document is used as-is.
    #[must_use]
    pub fn decode(value: serde_json::Value) -> Self {
        match serde_json::from_value::<Self>(value) {
            Ok(doc) => {
                if doc.version != LEVEL_DOCUMENT_VERSION {
                    tracing::warn!(
                        found = doc.version,
                        expected = LEVEL_DOCUMENT_VERSION,
                        "level document version drift"
                    );
                }
                doc
            }
            Err(e) => {
                tracing::warn!("malformed level document, using defaults: {e}");
                Self::default()
            }
        }
    }

    /// Encode for storage
    #[must_use]
    pub fn encode(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}
