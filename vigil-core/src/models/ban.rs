//! Durable ban record
//!
//! One record per banned user per room, stored through the protocol
//! client's durable-record primitive. The record is metadata only: the
//! source of truth for "is this user banned" is the record combined with a
//! live membership of `ban`. A record whose user is no longer banned is
//! stale and must be treated as absent by readers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Current record schema version
pub const BAN_RECORD_VERSION: u32 = 1;

const fn current_version() -> u32 {
    BAN_RECORD_VERSION
}

/// Metadata describing an active ban
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    /// Schema version; drift is logged, not fatal
    #[serde(default = "current_version")]
    pub version: u32,

    /// Banned user
    pub target: UserId,

    /// Moderator who issued the ban
    pub banned_by: UserId,

    /// Human-readable reason, if one was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// When the ban was issued
    pub banned_at: DateTime<Utc>,

    /// Ban duration in milliseconds; `0` means permanent
    #[serde(default)]
    pub duration_ms: i64,

    /// RFC 3339 expiry timestamp; absent iff the ban is permanent.
    ///
    /// Kept as a string and parsed leniently on read: a malformed value is
    /// treated as "not expired" so a corrupt record never lifts a ban.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl BanRecord {
    /// Build a fresh record. `expires_at` is set iff `duration_ms > 0`.
    #[must_use]
    pub fn new(target: UserId, banned_by: UserId, reason: Option<String>, duration_ms: i64) -> Self {
        let banned_at = Utc::now();
        let expires_at = (duration_ms > 0).then(|| {
            (banned_at + chrono::Duration::milliseconds(duration_ms)).to_rfc3339()
        });
        Self {
            version: BAN_RECORD_VERSION,
            target,
            banned_by,
            reason,
            banned_at,
            duration_ms: duration_ms.max(0),
            expires_at,
        }
    }

    /// Whether the ban has no expiry
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        self.duration_ms <= 0
    }

    /// Parsed expiry instant. `None` for permanent bans and for records
    /// whose stored timestamp cannot be parsed.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        let raw = self.expires_at.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!(target_user = %self.target, "unparseable ban expiry {raw:?}: {e}");
                None
            }
        }
    }

    /// Whether the ban is past its expiry at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry().is_some_and(|expiry| now >= expiry)
    }

    /// Decode a stored payload.
    ///
    /// Returns `None` for cleared records (empty payloads) and for payloads
    /// that do not match the record shape; unknown fields are dropped.
    #[must_use]
    pub fn decode(value: &serde_json::Value) -> Option<Self> {
        if value.is_null() || value.as_object().is_some_and(|map| map.is_empty()) {
            return None;
        }
        match serde_json::from_value::<Self>(value.clone()) {
            Ok(record) => {
                if record.version != BAN_RECORD_VERSION {
                    tracing::warn!(
                        found = record.version,
                        expected = BAN_RECORD_VERSION,
                        "ban record version drift"
                    );
                }
                Some(record)
            }
            Err(e) => {
                tracing::warn!("undecodable ban record payload: {e}");
                None
            }
        }
    }

    /// Encode for storage
    #[must_use]
    pub fn encode(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}
