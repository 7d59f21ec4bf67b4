pub mod moderation;
pub mod roles;
pub mod sweeper;

pub use moderation::{BanInfo, ModerationService};
pub use roles::RoleRegistry;
pub use sweeper::{ExpirySweeper, SweepError, SweepReport};
