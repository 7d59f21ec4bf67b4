//! Moderation service
//!
//! Orchestrates ban/unban/kick: authorization checks against the room's
//! numeric hierarchy, the protocol-level action, the durable ban record and
//! the in-process reversal timer. Per `(room, target)` the states are
//! `Clean -> Banned -> Clean`; a timed ban is transient by construction.
//!
//! Ordering invariant: the protocol-level action always commits before any
//! local record is written or cleared. A crash in between leaves at worst a
//! stale record, which every reader treats as absent.

use std::sync::Arc;

use chrono::Utc;

use crate::authorization;
use crate::client::{Membership, RoomClient};
use crate::config::ModerationConfig;
use crate::error::{Error, Result};
use crate::models::{BanRecord, Capability, RoomId, UserId};
use crate::repository::BanRecordStore;

/// Observational ban state for one user
#[derive(Debug, Clone)]
pub struct BanInfo {
    pub is_banned: bool,
    pub is_expired: bool,
    pub record: Option<BanRecord>,
}

/// Moderation orchestration for rooms
#[derive(Clone)]
pub struct ModerationService {
    client: Arc<dyn RoomClient>,
    bans: BanRecordStore,
    config: ModerationConfig,
}

impl std::fmt::Debug for ModerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationService").finish()
    }
}

impl ModerationService {
    #[must_use]
    pub fn new(client: Arc<dyn RoomClient>, config: ModerationConfig) -> Self {
        let bans = BanRecordStore::new(client.clone(), config.ban_record_key.clone());
        Self { client, bans, config }
    }

    pub(crate) const fn ban_store(&self) -> &BanRecordStore {
        &self.bans
    }

    /// Ban a user, optionally for a limited duration.
    ///
    /// `duration_ms <= 0` means permanent: no expiry is recorded and no
    /// timer is scheduled. For timed bans an in-process timer reverses the
    /// ban after the duration; the reconciliation sweep covers timers lost
    /// to a restart.
    pub async fn ban(
        &self,
        room: &RoomId,
        moderator: &UserId,
        target: &UserId,
        reason: Option<String>,
        duration_ms: i64,
    ) -> Result<BanRecord> {
        if moderator == target {
            return Err(Error::Unauthorized("cannot ban yourself".to_string()));
        }

        self.check_enforcement(room, moderator, Some(target), Capability::BanMembers)
            .await?;

        self.client.ban(room, target, reason.clone()).await?;

        let record = BanRecord::new(target.clone(), moderator.clone(), reason, duration_ms);
        self.bans.write(room, &record).await?;

        if duration_ms > 0 {
            self.schedule_reversal(room.clone(), target.clone(), duration_ms as u64);
        }

        tracing::info!(
            room = %room,
            target = %target,
            moderator = %moderator,
            duration_ms,
            "banned user"
        );
        Ok(record)
    }

    /// Lift a ban.
    ///
    /// The caller must hold at least the level a ban would require in this
    /// room. Any outstanding timer for the target is left to fire; it
    /// no-ops once the membership is no longer `ban`.
    pub async fn unban(&self, room: &RoomId, moderator: &UserId, target: &UserId) -> Result<()> {
        self.check_enforcement(room, moderator, None, Capability::BanMembers)
            .await?;

        self.client.unban(room, target).await?;
        self.bans.clear(room, target).await?;

        tracing::info!(room = %room, target = %target, moderator = %moderator, "unbanned user");
        Ok(())
    }

    /// Kick a user out of a room. No durable record is kept.
    pub async fn kick(
        &self,
        room: &RoomId,
        moderator: &UserId,
        target: &UserId,
        reason: Option<String>,
    ) -> Result<()> {
        if moderator == target {
            return Err(Error::Unauthorized("cannot kick yourself".to_string()));
        }

        self.check_enforcement(room, moderator, Some(target), Capability::KickMembers)
            .await?;

        self.client.kick(room, target, reason).await?;

        tracing::info!(room = %room, target = %target, moderator = %moderator, "kicked user");
        Ok(())
    }

    /// Reverse a ban iff the target is still banned.
    ///
    /// Single choke point for timer-driven and sweep-driven reversal.
    /// Re-validates live membership before acting, so concurrent
    /// invocations collapse to one effective unban: the late check sees a
    /// non-banned membership and no-ops. Returns whether a reversal
    /// actually happened.
    pub async fn reverse_if_active(&self, room: &RoomId, target: &UserId) -> Result<bool> {
        let membership = self.client.membership(room, target).await?;
        if membership != Some(Membership::Ban) {
            tracing::debug!(room = %room, target = %target, "ban already reversed, skipping");
            return Ok(false);
        }

        self.client.unban(room, target).await?;
        self.bans.clear(room, target).await?;

        tracing::info!(room = %room, target = %target, "reversed expired ban");
        Ok(true)
    }

    /// Observational ban state; never reverses anything.
    ///
    /// A stored record whose live membership is not `ban` is stale and
    /// reported as absent.
    pub async fn get_ban_info(&self, room: &RoomId, target: &UserId) -> Result<BanInfo> {
        let is_banned = self
            .client
            .membership(room, target)
            .await?
            .is_some_and(|m| m.is_banned());

        if !is_banned {
            return Ok(BanInfo {
                is_banned: false,
                is_expired: false,
                record: None,
            });
        }

        let record = self.bans.read(room, target).await?;
        let is_expired = record
            .as_ref()
            .is_some_and(|r| r.is_expired(Utc::now()));

        Ok(BanInfo {
            is_banned,
            is_expired,
            record,
        })
    }

    /// All live ban records of a room, stale ones filtered out
    pub async fn get_banned_users(&self, room: &RoomId) -> Result<Vec<BanRecord>> {
        let mut records = Vec::new();
        for (target, record) in self.bans.enumerate(room).await? {
            let Some(record) = record else { continue };
            let banned = self
                .client
                .membership(room, &target)
                .await?
                .is_some_and(|m| m.is_banned());
            if banned {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Shared precondition block for punitive actions.
    ///
    /// Resolves the room and the involved members, then requires the
    /// moderator to strictly outrank the target (moderation never flows
    /// sideways, even between two level-100 users) and to clear the
    /// action's enforcement level.
    async fn check_enforcement(
        &self,
        room: &RoomId,
        moderator: &UserId,
        target: Option<&UserId>,
        capability: Capability,
    ) -> Result<()> {
        let document = self.client.level_document(room).await?;

        if self.client.membership(room, moderator).await?.is_none() {
            return Err(Error::NotFound(format!(
                "moderator {moderator} is not known in room {room}"
            )));
        }
        if let Some(target) = target {
            if self.client.membership(room, target).await?.is_none() {
                return Err(Error::NotFound(format!(
                    "user {target} is not known in room {room}"
                )));
            }
        }

        let moderator_level = self.client.user_level(room, moderator).await?;

        if let Some(target) = target {
            let target_level = self.client.user_level(room, target).await?;
            if moderator_level <= target_level {
                return Err(Error::Unauthorized(format!(
                    "level {moderator_level} does not outrank target level {target_level}"
                )));
            }
        }

        let required = authorization::enforcement_level(capability, &document)
            .max(self.config.moderator_threshold);
        if moderator_level < required {
            return Err(Error::Unauthorized(format!(
                "level {moderator_level} is below the required level {required}"
            )));
        }

        Ok(())
    }

    fn schedule_reversal(&self, room: RoomId, target: UserId, after_ms: u64) {
        let service = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(after_ms)).await;
            match service.reverse_if_active(&room, &target).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(room = %room, target = %target, "ban timer fired as no-op");
                }
                Err(e) => {
                    // The sweep will retry; timers are best-effort
                    tracing::error!(room = %room, target = %target, "timed unban failed: {e}");
                }
            }
        });
    }
}
