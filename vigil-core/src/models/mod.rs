pub mod ban;
pub mod capability;
pub mod id;
pub mod level;
pub mod role;

pub use ban::{BanRecord, BAN_RECORD_VERSION};
pub use capability::{
    Capability, CapabilityCategory, CapabilityRule, CapabilitySet, RuleScope, DEFAULT_LEVEL,
    FULL_CONTROL_LEVEL, MODERATOR_LEVEL,
};
pub use id::{RoleId, RoomId, UserId};
pub use level::{LevelDocument, LEVEL_DOCUMENT_VERSION};
pub use role::{
    template_for_level, validate_role_name, Role, RoleDocument, RolePatch, RoleSpec,
    MAX_ROLE_NAME_LEN, ROLE_DOCUMENT_VERSION,
};
