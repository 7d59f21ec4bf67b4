//! Named capability model
//!
//! Capabilities are the human-facing permission vocabulary. Each capability
//! compiles down to zero or more protocol action keys with a required
//! authorization level (see `authorization`). Capabilities with no rules are
//! "soft": the protocol layer cannot gate them independently, so they are
//! granted unconditionally once requested.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default member authorization level
pub const DEFAULT_LEVEL: i64 = 0;

/// Conventional moderator authorization level
pub const MODERATOR_LEVEL: i64 = 50;

/// Full-control authorization level
pub const FULL_CONTROL_LEVEL: i64 = 100;

/// Where a compiled action rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Room-wide action (messages, settings, pins)
    Room,
    /// Action aimed at a specific member (kick, ban, invite)
    Member,
}

/// One compiled `(action key, required level)` tuple for a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityRule {
    /// Protocol action key this capability gates
    pub action: &'static str,
    /// Minimum authorization level required for the action
    pub level: i64,
    /// Whether the action writes durable room state
    pub durable_state: bool,
    /// Scope of the action
    pub scope: RuleScope,
}

const fn rule(action: &'static str, level: i64, durable_state: bool, scope: RuleScope) -> CapabilityRule {
    CapabilityRule { action, level, durable_state, scope }
}

const VIEW_ROOM_RULES: [CapabilityRule; 1] =
    [rule("room.history.read", DEFAULT_LEVEL, false, RuleScope::Room)];
const MANAGE_ROOM_RULES: [CapabilityRule; 3] = [
    rule("room.name", MODERATOR_LEVEL, true, RuleScope::Room),
    rule("room.topic", MODERATOR_LEVEL, true, RuleScope::Room),
    rule("room.avatar", MODERATOR_LEVEL, true, RuleScope::Room),
];
const MANAGE_ROLES_RULES: [CapabilityRule; 1] =
    [rule("room.authorization", MODERATOR_LEVEL, true, RuleScope::Room)];
const ADMINISTRATOR_RULES: [CapabilityRule; 2] = [
    rule("room.upgrade", FULL_CONTROL_LEVEL, true, RuleScope::Room),
    rule("room.access_control", FULL_CONTROL_LEVEL, true, RuleScope::Room),
];
const INVITE_MEMBERS_RULES: [CapabilityRule; 1] =
    [rule("room.member.invite", MODERATOR_LEVEL, false, RuleScope::Member)];
const KICK_MEMBERS_RULES: [CapabilityRule; 1] =
    [rule("room.member.kick", MODERATOR_LEVEL, false, RuleScope::Member)];
const BAN_MEMBERS_RULES: [CapabilityRule; 1] =
    [rule("room.member.ban", MODERATOR_LEVEL, false, RuleScope::Member)];
const SEND_MESSAGES_RULES: [CapabilityRule; 1] =
    [rule("room.message.send", DEFAULT_LEVEL, false, RuleScope::Room)];
const DELETE_MESSAGES_RULES: [CapabilityRule; 1] =
    [rule("room.message.redact", MODERATOR_LEVEL, false, RuleScope::Room)];
const PIN_MESSAGES_RULES: [CapabilityRule; 1] =
    [rule("room.pins", MODERATOR_LEVEL, true, RuleScope::Room)];
const MENTION_ROOM_RULES: [CapabilityRule; 1] =
    [rule("room.notify.room", MODERATOR_LEVEL, false, RuleScope::Room)];

/// Presentation grouping for capabilities. Carries no authorization
/// semantics; only used to organize permission editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityCategory {
    General,
    Membership,
    Messaging,
    Voice,
}

/// Closed enumeration of named permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewRoom,
    ManageRoom,
    ManageRoles,
    Administrator,
    InviteMembers,
    KickMembers,
    BanMembers,
    SendMessages,
    DeleteMessages,
    PinMessages,
    MentionRoom,
    Speak,
    UseVideo,
}

impl Capability {
    /// Every capability, in presentation order
    pub const ALL: [Self; 13] = [
        Self::ViewRoom,
        Self::ManageRoom,
        Self::ManageRoles,
        Self::Administrator,
        Self::InviteMembers,
        Self::KickMembers,
        Self::BanMembers,
        Self::SendMessages,
        Self::DeleteMessages,
        Self::PinMessages,
        Self::MentionRoom,
        Self::Speak,
        Self::UseVideo,
    ];

    /// Bit assigned to this capability inside a [`CapabilitySet`]
    #[must_use]
    pub const fn bit(self) -> u64 {
        match self {
            Self::ViewRoom => 1 << 0,
            Self::ManageRoom => 1 << 1,
            Self::ManageRoles => 1 << 2,
            Self::Administrator => 1 << 3,
            Self::InviteMembers => 1 << 10,
            Self::KickMembers => 1 << 11,
            Self::BanMembers => 1 << 12,
            Self::SendMessages => 1 << 20,
            Self::DeleteMessages => 1 << 21,
            Self::PinMessages => 1 << 22,
            Self::MentionRoom => 1 << 23,
            Self::Speak => 1 << 30,
            Self::UseVideo => 1 << 31,
        }
    }

    /// Stable wire name (matches the serde representation)
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ViewRoom => "view_room",
            Self::ManageRoom => "manage_room",
            Self::ManageRoles => "manage_roles",
            Self::Administrator => "administrator",
            Self::InviteMembers => "invite_members",
            Self::KickMembers => "kick_members",
            Self::BanMembers => "ban_members",
            Self::SendMessages => "send_messages",
            Self::DeleteMessages => "delete_messages",
            Self::PinMessages => "pin_messages",
            Self::MentionRoom => "mention_room",
            Self::Speak => "speak",
            Self::UseVideo => "use_video",
        }
    }

    /// Presentation category
    #[must_use]
    pub const fn category(self) -> CapabilityCategory {
        match self {
            Self::ViewRoom | Self::ManageRoom | Self::ManageRoles | Self::Administrator => {
                CapabilityCategory::General
            }
            Self::InviteMembers | Self::KickMembers | Self::BanMembers => {
                CapabilityCategory::Membership
            }
            Self::SendMessages | Self::DeleteMessages | Self::PinMessages | Self::MentionRoom => {
                CapabilityCategory::Messaging
            }
            Self::Speak | Self::UseVideo => CapabilityCategory::Voice,
        }
    }

    /// Compiled action rules for this capability.
    ///
    /// The table is total: every capability has an entry, possibly empty.
    /// An empty entry marks a soft capability.
    #[must_use]
    pub const fn rules(self) -> &'static [CapabilityRule] {
        match self {
            Self::ViewRoom => &VIEW_ROOM_RULES,
            Self::ManageRoom => &MANAGE_ROOM_RULES,
            Self::ManageRoles => &MANAGE_ROLES_RULES,
            Self::Administrator => &ADMINISTRATOR_RULES,
            Self::InviteMembers => &INVITE_MEMBERS_RULES,
            Self::KickMembers => &KICK_MEMBERS_RULES,
            Self::BanMembers => &BAN_MEMBERS_RULES,
            Self::SendMessages => &SEND_MESSAGES_RULES,
            Self::DeleteMessages => &DELETE_MESSAGES_RULES,
            Self::PinMessages => &PIN_MESSAGES_RULES,
            Self::MentionRoom => &MENTION_ROOM_RULES,
            // Soft capabilities: no protocol action gates these
            Self::Speak | Self::UseVideo => &[],
        }
    }

    /// Whether the protocol layer can gate this capability on its own
    #[must_use]
    pub const fn is_soft(self) -> bool {
        self.rules().is_empty()
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| format!("Unknown capability: {s}"))
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Set of enabled capabilities as a 64-bit mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(pub u64);

impl CapabilitySet {
    /// Baseline capabilities every member starts with
    pub const DEFAULT_MEMBER: u64 = Capability::ViewRoom.bit()
        | Capability::SendMessages.bit()
        | Capability::Speak.bit()
        | Capability::UseVideo.bit();

    /// Conventional moderator capabilities
    pub const MODERATOR: u64 = Self::DEFAULT_MEMBER
        | Capability::ManageRoom.bit()
        | Capability::ManageRoles.bit()
        | Capability::InviteMembers.bit()
        | Capability::KickMembers.bit()
        | Capability::BanMembers.bit()
        | Capability::DeleteMessages.bit()
        | Capability::PinMessages.bit()
        | Capability::MentionRoom.bit();

    /// Everything, including `administrator`
    pub const ADMINISTRATOR: u64 = Self::MODERATOR | Capability::Administrator.bit();

    pub const NONE: u64 = 0;

    #[must_use]
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self(Self::NONE)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Check if the set contains a capability
    #[must_use]
    pub const fn has(&self, capability: Capability) -> bool {
        (self.0 & capability.bit()) != 0
    }

    /// Enable a capability
    pub fn grant(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    /// Disable a capability
    pub fn revoke(&mut self, capability: Capability) {
        self.0 &= !capability.bit();
    }

    /// Set the state of a capability
    pub fn set(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.grant(capability);
        } else {
            self.revoke(capability);
        }
    }

    /// Whether every capability of `other` is also enabled here
    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Iterate over enabled capabilities in presentation order
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.has(*c))
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::empty();
        for capability in iter {
            set.grant(capability);
        }
        set
    }
}
