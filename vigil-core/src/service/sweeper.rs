//! Expiry sweeper
//!
//! Reconciliation for timed bans. In-process timers are a latency
//! optimization and die with the process; the sweep is the durability
//! mechanism. It must run at least once at startup for every room with
//! outstanding bans, and periodically thereafter.

use std::time::Duration;

use chrono::Utc;

use crate::error::Result;
use crate::models::{RoomId, UserId};

use super::moderation::ModerationService;

/// Per-target failure collected during a sweep
#[derive(Debug, Clone)]
pub struct SweepError {
    pub target: UserId,
    pub message: String,
}

/// Outcome of one reconciliation pass over a room
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Records enumerated, including undecodable and unexpired ones
    pub checked: usize,
    /// Bans actually reversed by this pass
    pub reversed: usize,
    /// Per-target failures; the scan never aborts on one bad record
    pub errors: Vec<SweepError>,
}

/// Periodic/on-demand reversal of expired bans
#[derive(Clone)]
pub struct ExpirySweeper {
    moderation: ModerationService,
}

impl std::fmt::Debug for ExpirySweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirySweeper").finish()
    }
}

impl ExpirySweeper {
    #[must_use]
    pub fn new(moderation: ModerationService) -> Self {
        Self { moderation }
    }

    /// Scan every ban record of a room and reverse the expired ones.
    ///
    /// Partial-failure semantics: a failing reversal is reported per target
    /// and the scan continues. Records with no expiry, a future expiry or
    /// an unparseable expiry are counted as checked and left alone. Safe to
    /// run concurrently with itself and with live timers; a reversal that
    /// lost the race is observed as "already not banned" and no-ops.
    pub async fn check_expired_bans(&self, room: &RoomId) -> Result<SweepReport> {
        let entries = self.moderation.ban_store().enumerate(room).await?;
        let now = Utc::now();
        let mut report = SweepReport::default();

        for (target, record) in entries {
            report.checked += 1;

            let Some(record) = record else {
                // Undecodable payload: left in place, reported as neither
                // reversed nor failed
                continue;
            };
            if !record.is_expired(now) {
                continue;
            }

            match self.moderation.reverse_if_active(room, &target).await {
                Ok(true) => report.reversed += 1,
                Ok(false) => {} // a timer or concurrent sweep got there first
                Err(e) => report.errors.push(SweepError {
                    target,
                    message: e.to_string(),
                }),
            }
        }

        tracing::debug!(
            room = %room,
            checked = report.checked,
            reversed = report.reversed,
            failed = report.errors.len(),
            "ban expiry sweep finished"
        );
        Ok(report)
    }

    /// Start the periodic sweep task over a fixed set of rooms.
    ///
    /// The first pass runs immediately, covering timers lost to a restart.
    pub fn start(&self, rooms: Vec<RoomId>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let sweeper = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                for room in &rooms {
                    match sweeper.check_expired_bans(room).await {
                        Ok(report) => {
                            if report.reversed > 0 || !report.errors.is_empty() {
                                tracing::info!(
                                    room = %room,
                                    checked = report.checked,
                                    reversed = report.reversed,
                                    failed = report.errors.len(),
                                    "reconciled expired bans"
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!(room = %room, "ban expiry sweep failed: {e}");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModerationConfig;
    use crate::client::Membership;
    use crate::models::BanRecord;
    use crate::repository::BanRecordStore;
    use crate::test_helpers::{test_room_id, test_user_id, FakeRoomClient};
    use std::sync::Arc;

    fn setup() -> (Arc<FakeRoomClient>, ModerationService, ExpirySweeper, BanRecordStore, RoomId) {
        let client = Arc::new(FakeRoomClient::new());
        let config = ModerationConfig::default();
        let store = BanRecordStore::new(client.clone(), config.ban_record_key.clone());
        let moderation = ModerationService::new(client.clone(), config);
        let sweeper = ExpirySweeper::new(moderation.clone());
        let room = test_room_id("!lobby:example.org");
        (client, moderation, sweeper, store, room)
    }

    /// Plant a ban record directly, as a previous process run would have
    async fn plant_ban(
        client: &FakeRoomClient,
        store: &BanRecordStore,
        room: &RoomId,
        target: &UserId,
        expires_at: Option<String>,
    ) -> BanRecord {
        client.join(room, target, 0);
        client.force_membership(room, target, Membership::Ban);

        let mut record = BanRecord::new(
            target.clone(),
            test_user_id("@mod:example.org"),
            None,
            if expires_at.is_some() { 1 } else { 0 },
        );
        record.expires_at = expires_at;
        store.write(room, &record).await.expect("plant record");
        record
    }

    fn past() -> Option<String> {
        Some((Utc::now() - chrono::Duration::seconds(60)).to_rfc3339())
    }

    fn future() -> Option<String> {
        Some((Utc::now() + chrono::Duration::seconds(3600)).to_rfc3339())
    }

    #[tokio::test]
    async fn test_sweep_reverses_only_expired() {
        let (client, _moderation, sweeper, store, room) = setup();

        let expired = test_user_id("@expired:example.org");
        let pending = test_user_id("@pending:example.org");
        let permanent = test_user_id("@permanent:example.org");
        plant_ban(&client, &store, &room, &expired, past()).await;
        plant_ban(&client, &store, &room, &pending, future()).await;
        plant_ban(&client, &store, &room, &permanent, None).await;

        let report = sweeper.check_expired_bans(&room).await.expect("sweep");

        assert_eq!(report.checked, 3);
        assert_eq!(report.reversed, 1);
        assert!(report.errors.is_empty());
        assert_eq!(client.membership_of(&room, &expired), Some(Membership::Leave));
        assert_eq!(client.membership_of(&room, &pending), Some(Membership::Ban));
        assert_eq!(client.membership_of(&room, &permanent), Some(Membership::Ban));
    }

    #[tokio::test]
    async fn test_sweep_skips_malformed_expiry() {
        let (client, _moderation, sweeper, store, room) = setup();

        // Five records: one malformed, four expired
        let malformed = test_user_id("@malformed:example.org");
        plant_ban(&client, &store, &room, &malformed, Some("not-a-timestamp".into())).await;
        for i in 0..4 {
            let target = test_user_id(&format!("@victim{i}:example.org"));
            plant_ban(&client, &store, &room, &target, past()).await;
        }

        let report = sweeper.check_expired_bans(&room).await.expect("sweep");

        assert_eq!(report.checked, 5);
        assert_eq!(report.reversed, 4);
        assert!(report.errors.is_empty());
        // The malformed record leaves the ban in place
        assert_eq!(client.membership_of(&room, &malformed), Some(Membership::Ban));
    }

    #[tokio::test]
    async fn test_sweep_collects_errors_without_aborting() {
        let (client, _moderation, sweeper, store, room) = setup();

        let cursed = test_user_id("@cursed:example.org");
        let fine = test_user_id("@fine:example.org");
        plant_ban(&client, &store, &room, &cursed, past()).await;
        plant_ban(&client, &store, &room, &fine, past()).await;
        client.fail_unban_for(&cursed);

        let report = sweeper.check_expired_bans(&room).await.expect("sweep");

        assert_eq!(report.checked, 2);
        assert_eq!(report.reversed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].target, cursed);
        assert_eq!(client.membership_of(&room, &fine), Some(Membership::Leave));
        assert_eq!(client.membership_of(&room, &cursed), Some(Membership::Ban));
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_reverse_once() {
        let (client, _moderation, sweeper, store, room) = setup();

        let target = test_user_id("@target:example.org");
        plant_ban(&client, &store, &room, &target, past()).await;

        let (a, b) = tokio::join!(
            sweeper.check_expired_bans(&room),
            sweeper.check_expired_bans(&room)
        );
        let (a, b) = (a.expect("first sweep"), b.expect("second sweep"));

        assert_eq!(a.reversed + b.reversed, 1);
        assert_eq!(client.unban_count(), 1);
    }

    #[tokio::test]
    async fn test_sweep_after_restart_reverses_timerless_ban() {
        // A fresh service has no in-memory timers; the sweep alone must
        // reconcile a ban recorded before the restart
        let (client, moderation, _old_sweeper, store, room) = setup();
        let target = test_user_id("@target:example.org");
        plant_ban(&client, &store, &room, &target, past()).await;

        let restarted = ExpirySweeper::new(moderation);
        let report = restarted.check_expired_bans(&room).await.expect("sweep");

        assert_eq!(report.reversed, 1);
        assert!(store.read(&room, &target).await.expect("read").is_none());
    }
}
