pub mod authorization;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;
pub mod service;

#[cfg(test)]
pub mod test_helpers;

pub use client::{Membership, RoomClient};
pub use config::Config;
pub use error::{Error, Result};
