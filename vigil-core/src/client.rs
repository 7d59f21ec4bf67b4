//! External protocol client interface
//!
//! Everything durable in this crate flows through this trait: membership
//! actions, the per-room authorization-level document, per-user durable
//! records and per-room account documents. The trait is injected into every
//! service so components stay independently testable against a substitute
//! client; there is no global client instance.

use async_trait::async_trait;
use std::str::FromStr;

use crate::error::Result;
use crate::models::{LevelDocument, RoomId, UserId};

/// Membership state of a user in a room, as reported by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Join,
    Invite,
    Leave,
    Ban,
    Knock,
}

impl Membership {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Invite => "invite",
            Self::Leave => "leave",
            Self::Ban => "ban",
            Self::Knock => "knock",
        }
    }

    #[must_use]
    pub const fn is_banned(&self) -> bool {
        matches!(self, Self::Ban)
    }
}

impl FromStr for Membership {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "join" => Ok(Self::Join),
            "invite" => Ok(Self::Invite),
            "leave" => Ok(Self::Leave),
            "ban" => Ok(Self::Ban),
            "knock" => Ok(Self::Knock),
            _ => Err(format!("Unknown membership: {s}")),
        }
    }
}

impl std::fmt::Display for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operations this crate consumes from the protocol client.
///
/// Implementations wrap their own transport failures as
/// [`crate::Error::Upstream`]; local validation never reaches the client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomClient: Send + Sync {
    /// Effective authorization level of a user in a room
    async fn user_level(&self, room: &RoomId, user: &UserId) -> Result<i64>;

    /// Current authorization-level document of a room
    async fn level_document(&self, room: &RoomId) -> Result<LevelDocument>;

    /// Replace the authorization-level document of a room
    async fn set_level_document(&self, room: &RoomId, document: &LevelDocument) -> Result<()>;

    /// Protocol-level ban
    async fn ban(&self, room: &RoomId, user: &UserId, reason: Option<String>) -> Result<()>;

    /// Protocol-level unban
    async fn unban(&self, room: &RoomId, user: &UserId) -> Result<()>;

    /// Protocol-level kick
    async fn kick(&self, room: &RoomId, user: &UserId, reason: Option<String>) -> Result<()>;

    /// Write a durable per-user record under a record key.
    /// Writing an empty payload clears the record.
    async fn write_record(
        &self,
        room: &RoomId,
        record_key: &str,
        target: &UserId,
        payload: serde_json::Value,
    ) -> Result<()>;

    /// Read a durable per-user record, if present
    async fn read_record(
        &self,
        room: &RoomId,
        record_key: &str,
        target: &UserId,
    ) -> Result<Option<serde_json::Value>>;

    /// Enumerate all durable records under a record key
    async fn enumerate_records(
        &self,
        room: &RoomId,
        record_key: &str,
    ) -> Result<Vec<(UserId, serde_json::Value)>>;

    /// Read a per-room account document, if present
    async fn read_account_document(
        &self,
        room: &RoomId,
        key: &str,
    ) -> Result<Option<serde_json::Value>>;

    /// Write a per-room account document
    async fn write_account_document(
        &self,
        room: &RoomId,
        key: &str,
        document: serde_json::Value,
    ) -> Result<()>;

    /// Current membership of a user, `None` if the user is unknown to the room
    async fn membership(&self, room: &RoomId, user: &UserId) -> Result<Option<Membership>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_roundtrip() {
        for m in [
            Membership::Join,
            Membership::Invite,
            Membership::Leave,
            Membership::Ban,
            Membership::Knock,
        ] {
            let parsed: Membership = m.as_str().parse().expect("parse back");
            assert_eq!(parsed, m);
        }
        assert!("ghost".parse::<Membership>().is_err());
    }

    #[test]
    fn test_only_ban_is_banned() {
        assert!(Membership::Ban.is_banned());
        assert!(!Membership::Join.is_banned());
        assert!(!Membership::Leave.is_banned());
    }
}
