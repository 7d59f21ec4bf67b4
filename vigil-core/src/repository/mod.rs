pub mod bans;
pub mod roles;

pub use bans::BanRecordStore;
pub use roles::RoleDocumentStore;
