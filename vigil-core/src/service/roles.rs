//! Role registry service
//!
//! CRUD over the named roles of a room. Every mutation is one
//! read-modify-write of the registry document; the only side effect beyond
//! that document is the mass level reassignment performed when a role's
//! level changes or the role is deleted.

use std::sync::Arc;

use crate::authorization;
use crate::client::RoomClient;
use crate::config::ModerationConfig;
use crate::error::{Error, Result};
use crate::models::{
    template_for_level, validate_role_name, Role, RoleId, RolePatch, RoleSpec, RoomId, UserId,
    DEFAULT_LEVEL, FULL_CONTROL_LEVEL,
};
use crate::repository::RoleDocumentStore;

/// Named-role management for rooms
#[derive(Clone)]
pub struct RoleRegistry {
    client: Arc<dyn RoomClient>,
    store: RoleDocumentStore,
}

impl std::fmt::Debug for RoleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleRegistry").finish()
    }
}

impl RoleRegistry {
    #[must_use]
    pub fn new(client: Arc<dyn RoomClient>, config: &ModerationConfig) -> Self {
        let store = RoleDocumentStore::new(client.clone(), config.role_document_key.clone());
        Self { client, store }
    }

    /// All roles of a room, ordered by position
    pub async fn list(&self, room: &RoomId) -> Result<Vec<Role>> {
        let mut roles = self.store.load(room).await?.roles;
        roles.sort_by_key(|r| r.position);
        Ok(roles)
    }

    /// A single role by ID
    pub async fn get(&self, room: &RoomId, role_id: &RoleId) -> Result<Role> {
        self.store
            .load(room)
            .await?
            .find(role_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("role {role_id} not found in room {room}")))
    }

    /// Create a role.
    ///
    /// When the spec omits capabilities they are derived from the template
    /// closest to the role's level.
    pub async fn create(&self, room: &RoomId, spec: RoleSpec) -> Result<RoleId> {
        validate_role_name(&spec.name)?;
        validate_level(spec.level)?;

        let mut document = self.store.load(room).await?;
        if document.name_taken(&spec.name, None) {
            return Err(Error::Conflict(format!(
                "a role named {:?} already exists",
                spec.name.trim()
            )));
        }

        let capabilities = spec
            .capabilities
            .unwrap_or_else(|| template_for_level(spec.level));
        for violation in authorization::validate(capabilities, spec.level) {
            tracing::warn!(room = %room, name = %spec.name, "role capability mismatch: {violation}");
        }

        let role = Role {
            id: RoleId::new(),
            name: spec.name.trim().to_string(),
            color: spec.color,
            icon: spec.icon,
            level: spec.level,
            capabilities,
            member_count: 0,
            position: document.roles.len() as u32 + 1,
            is_default: false,
            created_at: chrono::Utc::now(),
        };
        let role_id = role.id.clone();
        document.roles.push(role);
        self.store.write(room, &document).await?;

        tracing::info!(room = %room, role = %role_id, "created role");
        Ok(role_id)
    }

    /// Patch a role.
    ///
    /// A level change re-homes every user currently at the old level onto
    /// the new level before the registry document is persisted.
    pub async fn update(&self, room: &RoomId, role_id: &RoleId, patch: RolePatch) -> Result<()> {
        let mut document = self.store.load(room).await?;
        let role = document
            .find(role_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("role {role_id} not found in room {room}")))?;

        if let Some(name) = &patch.name {
            validate_role_name(name)?;
            if document.name_taken(name, Some(role_id)) {
                return Err(Error::Conflict(format!(
                    "a role named {:?} already exists",
                    name.trim()
                )));
            }
        }
        if let Some(level) = patch.level {
            validate_level(level)?;
            if level != role.level {
                self.reassign_level(room, role.level, level).await?;
            }
        }

        // Infallible from here on: apply the patch and persist
        let role = document
            .find_mut(role_id)
            .ok_or_else(|| Error::Internal("role vanished mid-update".to_string()))?;
        if let Some(name) = patch.name {
            role.name = name.trim().to_string();
        }
        if let Some(color) = patch.color {
            role.color = color;
        }
        if let Some(icon) = patch.icon {
            role.icon = Some(icon);
        }
        if let Some(level) = patch.level {
            role.level = level;
        }
        if let Some(capabilities) = patch.capabilities {
            role.capabilities = capabilities;
        }

        self.store.write(room, &document).await?;
        tracing::info!(room = %room, role = %role_id, "updated role");
        Ok(())
    }

    /// Delete a role.
    ///
    /// The default role cannot be deleted. Every user at the role's level
    /// is demoted to the default level, and the remaining roles are
    /// renumbered densely.
    pub async fn delete(&self, room: &RoomId, role_id: &RoleId) -> Result<()> {
        let mut document = self.store.load(room).await?;
        let role = document
            .find(role_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("role {role_id} not found in room {room}")))?;

        if role.is_default {
            return Err(Error::Conflict("cannot delete the default role".to_string()));
        }

        self.reassign_level(room, role.level, DEFAULT_LEVEL).await?;

        document.roles.retain(|r| &r.id != role_id);
        document.renumber_positions();
        self.store.write(room, &document).await?;

        tracing::info!(room = %room, role = %role_id, "deleted role");
        Ok(())
    }

    /// Apply a caller-supplied position map verbatim.
    ///
    /// The caller is responsible for supplying a valid permutation;
    /// collisions resolve last-write-wins and unknown IDs are skipped.
    pub async fn reorder(&self, room: &RoomId, positions: &[(RoleId, u32)]) -> Result<()> {
        let mut document = self.store.load(room).await?;

        for (role_id, position) in positions {
            match document.find_mut(role_id) {
                Some(role) => role.position = *position,
                None => {
                    tracing::warn!(room = %room, role = %role_id, "reorder skipped unknown role");
                }
            }
        }

        self.store.write(room, &document).await
    }

    /// Put a user on a role: sets the user's level to the role's level and
    /// bumps the role's cached member count. The count is best-effort; the
    /// live level map stays the ground truth.
    pub async fn assign_user(&self, room: &RoomId, user: &UserId, role_id: &RoleId) -> Result<()> {
        let mut document = self.store.load(room).await?;
        let role = document
            .find_mut(role_id)
            .ok_or_else(|| Error::NotFound(format!("role {role_id} not found in room {room}")))?;

        let mut levels = self.client.level_document(room).await?;
        levels.set_user_level(user, role.level);
        self.client.set_level_document(room, &levels).await?;

        role.member_count = role.member_count.saturating_add(1);
        let role_id = role.id.clone();
        self.store.write(room, &document).await?;

        tracing::info!(room = %room, user = %user, role = %role_id, "assigned user to role");
        Ok(())
    }

    /// Move every user with an explicit entry at `from` onto `to`
    async fn reassign_level(&self, room: &RoomId, from: i64, to: i64) -> Result<()> {
        let mut levels = self.client.level_document(room).await?;
        let affected = levels.users_at_level(from);
        if affected.is_empty() {
            return Ok(());
        }

        for user in &affected {
            levels.set_user_level(user, to);
        }
        self.client.set_level_document(room, &levels).await?;

        tracing::info!(
            room = %room,
            from,
            to,
            count = affected.len(),
            "reassigned user levels"
        );
        Ok(())
    }
}

fn validate_level(level: i64) -> Result<()> {
    if !(DEFAULT_LEVEL..=FULL_CONTROL_LEVEL).contains(&level) {
        return Err(Error::InvalidInput(format!(
            "level {level} is outside [0, 100]"
        )));
    }
    Ok(())
}
