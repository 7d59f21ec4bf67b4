//! Test helpers and fixtures for vigil-core tests
//!
//! Provides ID fixtures and an in-memory [`FakeRoomClient`] so service
//! tests can exercise full ban/role flows without a live protocol backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{Membership, RoomClient};
use crate::error::{Error, Result};
use crate::models::{LevelDocument, RoomId, UserId};

/// Create a test room ID
pub fn test_room_id(id: &str) -> RoomId {
    RoomId::from(id)
}

/// Create a test user ID
pub fn test_user_id(id: &str) -> UserId {
    UserId::from(id)
}

#[derive(Default)]
struct RoomState {
    levels: LevelDocument,
    memberships: HashMap<UserId, Membership>,
    records: HashMap<(String, UserId), serde_json::Value>,
    account: HashMap<String, serde_json::Value>,
}

/// In-memory protocol client.
///
/// Memberships, the level document, durable records and account documents
/// all live behind one mutex per fake. Protocol calls are counted, and
/// unban can be made to fail for chosen targets to exercise partial-failure
/// paths.
#[derive(Default)]
pub struct FakeRoomClient {
    rooms: Mutex<HashMap<RoomId, RoomState>>,
    ban_calls: Mutex<Vec<(RoomId, UserId)>>,
    unban_calls: Mutex<Vec<(RoomId, UserId)>>,
    kick_calls: Mutex<Vec<(RoomId, UserId)>>,
    failing_unbans: Mutex<HashSet<UserId>>,
}

impl FakeRoomClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a user to a room at the given level
    pub fn join(&self, room: &RoomId, user: &UserId, level: i64) {
        let mut rooms = self.rooms.lock();
        let state = rooms.entry(room.clone()).or_default();
        state.memberships.insert(user.clone(), Membership::Join);
        state.levels.set_user_level(user, level);
    }

    /// Overwrite a user's level
    pub fn set_level(&self, room: &RoomId, user: &UserId, level: i64) {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room.clone())
            .or_default()
            .levels
            .set_user_level(user, level);
    }

    /// Raise a per-action minimum in the room's level document
    pub fn raise_action_level(&self, room: &RoomId, action: &str, durable: bool, level: i64) {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room.clone())
            .or_default()
            .levels
            .raise_action_level(action, durable, level);
    }

    /// Force a membership state without going through ban/unban/kick
    pub fn force_membership(&self, room: &RoomId, user: &UserId, membership: Membership) {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room.clone())
            .or_default()
            .memberships
            .insert(user.clone(), membership);
    }

    /// Make future unban calls fail for this target
    pub fn fail_unban_for(&self, user: &UserId) {
        self.failing_unbans.lock().insert(user.clone());
    }

    pub fn membership_of(&self, room: &RoomId, user: &UserId) -> Option<Membership> {
        self.rooms
            .lock()
            .get(room)
            .and_then(|state| state.memberships.get(user))
            .copied()
    }

    pub fn level_of(&self, room: &RoomId, user: &UserId) -> i64 {
        self.rooms
            .lock()
            .get(room)
            .map_or(0, |state| state.levels.user_level(user))
    }

    pub fn ban_count(&self) -> usize {
        self.ban_calls.lock().len()
    }

    pub fn unban_count(&self) -> usize {
        self.unban_calls.lock().len()
    }

    pub fn kick_count(&self) -> usize {
        self.kick_calls.lock().len()
    }
}

#[async_trait]
impl RoomClient for FakeRoomClient {
    async fn user_level(&self, room: &RoomId, user: &UserId) -> Result<i64> {
        Ok(self.level_of(room, user))
    }

    async fn level_document(&self, room: &RoomId) -> Result<LevelDocument> {
        Ok(self
            .rooms
            .lock()
            .get(room)
            .map(|state| state.levels.clone())
            .unwrap_or_default())
    }

    async fn set_level_document(&self, room: &RoomId, document: &LevelDocument) -> Result<()> {
        let mut rooms = self.rooms.lock();
        rooms.entry(room.clone()).or_default().levels = document.clone();
        Ok(())
    }

    async fn ban(&self, room: &RoomId, user: &UserId, _reason: Option<String>) -> Result<()> {
        self.ban_calls.lock().push((room.clone(), user.clone()));
        self.force_membership(room, user, Membership::Ban);
        Ok(())
    }

    async fn unban(&self, room: &RoomId, user: &UserId) -> Result<()> {
        if self.failing_unbans.lock().contains(user) {
            return Err(Error::Upstream(format!("injected unban failure for {user}")));
        }
        self.unban_calls.lock().push((room.clone(), user.clone()));
        self.force_membership(room, user, Membership::Leave);
        Ok(())
    }

    async fn kick(&self, room: &RoomId, user: &UserId, _reason: Option<String>) -> Result<()> {
        self.kick_calls.lock().push((room.clone(), user.clone()));
        self.force_membership(room, user, Membership::Leave);
        Ok(())
    }

    async fn write_record(
        &self,
        room: &RoomId,
        record_key: &str,
        target: &UserId,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room.clone())
            .or_default()
            .records
            .insert((record_key.to_string(), target.clone()), payload);
        Ok(())
    }

    async fn read_record(
        &self,
        room: &RoomId,
        record_key: &str,
        target: &UserId,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self
            .rooms
            .lock()
            .get(room)
            .and_then(|state| state.records.get(&(record_key.to_string(), target.clone())))
            .cloned())
    }

    async fn enumerate_records(
        &self,
        room: &RoomId,
        record_key: &str,
    ) -> Result<Vec<(UserId, serde_json::Value)>> {
        let rooms = self.rooms.lock();
        let Some(state) = rooms.get(room) else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<(UserId, serde_json::Value)> = state
            .records
            .iter()
            .filter(|((key, _), _)| key == record_key)
            .map(|((_, target), payload)| (target.clone(), payload.clone()))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
        Ok(entries)
    }

    async fn read_account_document(
        &self,
        room: &RoomId,
        key: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self
            .rooms
            .lock()
            .get(room)
            .and_then(|state| state.account.get(key))
            .cloned())
    }

    async fn write_account_document(
        &self,
        room: &RoomId,
        key: &str,
        document: serde_json::Value,
    ) -> Result<()> {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room.clone())
            .or_default()
            .account
            .insert(key.to_string(), document);
        Ok(())
    }

    async fn membership(&self, room: &RoomId, user: &UserId) -> Result<Option<Membership>> {
        Ok(self.membership_of(room, user))
    }
}
