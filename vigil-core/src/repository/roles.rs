//! Role document storage
//!
//! Serialization layer over the protocol client's per-room account
//! documents. A room with no stored document gets a freshly seeded
//! registry containing only the default role; the seed is persisted on the
//! first mutation.

use std::sync::Arc;

use crate::client::RoomClient;
use crate::error::Result;
use crate::models::{RoleDocument, RoomId};

/// Read/write access to the role registry document of a room
#[derive(Clone)]
pub struct RoleDocumentStore {
    client: Arc<dyn RoomClient>,
    document_key: String,
}

impl std::fmt::Debug for RoleDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleDocumentStore")
            .field("document_key", &self.document_key)
            .finish()
    }
}

impl RoleDocumentStore {
    #[must_use]
    pub fn new(client: Arc<dyn RoomClient>, document_key: impl Into<String>) -> Self {
        Self {
            client,
            document_key: document_key.into(),
        }
    }

    /// Load the registry document, seeding a default one when absent
    pub async fn load(&self, room: &RoomId) -> Result<RoleDocument> {
        let stored = self
            .client
            .read_account_document(room, &self.document_key)
            .await?;
        Ok(stored.map_or_else(RoleDocument::seeded, RoleDocument::decode))
    }

    /// Persist the registry document
    pub async fn write(&self, room: &RoomId, document: &RoleDocument) -> Result<()> {
        self.client
            .write_account_document(room, &self.document_key, document.encode())
            .await
    }
}
