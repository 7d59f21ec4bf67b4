//! Ban record storage
//!
//! Thin serialization layer over the protocol client's durable-record
//! primitive. No business logic lives here: callers decide when a record
//! may be written or cleared.

use std::sync::Arc;

use crate::client::RoomClient;
use crate::error::Result;
use crate::models::{BanRecord, RoomId, UserId};

/// Read/write access to per-user ban records in a room
#[derive(Clone)]
pub struct BanRecordStore {
    client: Arc<dyn RoomClient>,
    record_key: String,
}

impl std::fmt::Debug for BanRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BanRecordStore")
            .field("record_key", &self.record_key)
            .finish()
    }
}

impl BanRecordStore {
    #[must_use]
    pub fn new(client: Arc<dyn RoomClient>, record_key: impl Into<String>) -> Self {
        Self {
            client,
            record_key: record_key.into(),
        }
    }

    /// Persist a record for its target user
    pub async fn write(&self, room: &RoomId, record: &BanRecord) -> Result<()> {
        self.client
            .write_record(room, &self.record_key, &record.target, record.encode())
            .await
    }

    /// Read the record for a target, if one is stored and decodable
    pub async fn read(&self, room: &RoomId, target: &UserId) -> Result<Option<BanRecord>> {
        let payload = self
            .client
            .read_record(room, &self.record_key, target)
            .await?;
        Ok(payload.as_ref().and_then(BanRecord::decode))
    }

    /// Clear the record for a target by writing an empty payload.
    /// Clearing an absent record is a no-op.
    pub async fn clear(&self, room: &RoomId, target: &UserId) -> Result<()> {
        self.client
            .write_record(room, &self.record_key, target, serde_json::json!({}))
            .await
    }

    /// Enumerate every stored record in a room.
    ///
    /// Cleared records (empty payloads) are skipped entirely. Present but
    /// undecodable payloads are returned as `None` so callers can still
    /// count them.
    pub async fn enumerate(&self, room: &RoomId) -> Result<Vec<(UserId, Option<BanRecord>)>> {
        let entries = self
            .client
            .enumerate_records(room, &self.record_key)
            .await?;

        Ok(entries
            .into_iter()
            .filter(|(_, payload)| {
                !payload.is_null()
                    && !payload.as_object().is_some_and(|map| map.is_empty())
            })
            .map(|(target, payload)| {
                let record = BanRecord::decode(&payload);
                (target, record)
            })
            .collect())
    }
}
