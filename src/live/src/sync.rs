use crate::remote::{LiveGameRecord, RemoteStore};
use matchday_core::TriggerScan;
use chrono::Utc;
use database::LocalStore;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use uuid::Uuid;

const SYNC_INTERVAL: Duration = Duration::from_secs(15);

/// Last observed outcome of the remote mirror, for a status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Synced,
    Failed,
}

/// Requests an out-of-band synchronization tick (used for the final flush
/// when the app is backgrounded).
#[derive(Clone)]
pub struct SyncHandle {
    flush: mpsc::UnboundedSender<()>,
}

impl SyncHandle {
    pub fn request_flush(&self) {
        let _ = self.flush.send(());
    }

    /// A handle wired to nothing, for tests and tools that do not run the
    /// synchronizer loop.
    pub fn disconnected() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (flush, rx) = mpsc::unbounded_channel();
        (SyncHandle { flush }, rx)
    }
}

/// Mirrors the local timer + session records to one durable remote record
/// per user, so server-side push delivery can observe the game while the
/// client is closed.
///
/// Runs at a lower cadence than the trigger monitor and independently of
/// the editor-open flag. Each tick is idempotent: update the cached record
/// if one is known, otherwise look up an existing active record (resume
/// after restart) before creating a new one. A failed write invalidates
/// the cached id; the next tick re-resolves instead of retrying a broken
/// identifier forever.
pub struct StateSynchronizer {
    state: SyncState,
    flush: mpsc::UnboundedReceiver<()>,
}

struct SyncState {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    user_id: Uuid,
    record_id: Option<Uuid>,
    stale_checked: bool,
    status: watch::Sender<SyncStatus>,
}

impl StateSynchronizer {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        user_id: Uuid,
        status: watch::Sender<SyncStatus>,
    ) -> (Self, SyncHandle) {
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();

        let synchronizer = StateSynchronizer {
            state: SyncState {
                store,
                remote,
                user_id,
                record_id: None,
                stale_checked: false,
                status,
            },
            flush: flush_rx,
        };

        (synchronizer, SyncHandle { flush: flush_tx })
    }

    pub async fn run(self) {
        let StateSynchronizer {
            mut state,
            mut flush,
        } = self;

        let mut ticker = time::interval(SYNC_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => state.tick().await,
                request = flush.recv() => {
                    match request {
                        Some(()) => {
                            debug!("flushing session state before suspension");
                            state.tick().await;
                        }
                        None => break,
                    }
                }
            }
        }
    }
}

impl SyncState {
    async fn tick(&mut self) {
        let timer = self.store.load_timer();
        let session = self.store.load_session();

        let (Some(timer), Some(session)) = (timer, session) else {
            self.deactivate().await;
            return;
        };

        if !TriggerScan::session_qualifies(&session, &timer) {
            self.deactivate().await;
            return;
        }

        let timer_state = match serde_json::to_value(&timer) {
            Ok(value) => value,
            Err(err) => {
                warn!("cannot serialize timer record: {}", err);
                return;
            }
        };
        let pitch_state = match serde_json::to_value(&session) {
            Ok(value) => value,
            Err(err) => {
                warn!("cannot serialize session record: {}", err);
                return;
            }
        };

        self.stale_checked = true;

        // Resume an existing active record before creating a new one, so an
        // app restart never leaves duplicates behind.
        if self.record_id.is_none() {
            match self.remote.find_active(self.user_id).await {
                Ok(Some(existing)) => {
                    debug!("resuming remote live record {}", existing.id);
                    self.record_id = Some(existing.id);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("remote record lookup failed: {}", err);
                    let _ = self.status.send(SyncStatus::Failed);
                    return;
                }
            }
        }

        let is_update = self.record_id.is_some();

        let record = LiveGameRecord {
            id: self.record_id.unwrap_or_else(Uuid::new_v4),
            user_id: self.user_id,
            team_id: i64::from(session.team_id),
            timer_state,
            pitch_state,
            is_active: true,
            updated_at: Utc::now(),
        };

        let result = if is_update {
            self.remote.update(&record).await
        } else {
            self.remote.insert(&record).await
        };

        match result {
            Ok(()) => {
                self.record_id = Some(record.id);
                let _ = self.status.send(SyncStatus::Synced);
            }
            Err(err) => {
                warn!("remote sync failed, re-resolving on next tick: {}", err);
                self.record_id = None;
                let _ = self.status.send(SyncStatus::Failed);
            }
        }
    }

    /// No eligible session: mark the remote record inactive and forget it.
    async fn deactivate(&mut self) {
        let target = match self.record_id.take() {
            Some(id) => Some(id),
            None if !self.stale_checked => {
                // One-time startup sweep for a record left active by a
                // previous run that ended without a session.
                self.stale_checked = true;

                match self.remote.find_active(self.user_id).await {
                    Ok(found) => found.map(|r| r.id),
                    Err(err) => {
                        debug!("stale record lookup failed: {}", err);
                        None
                    }
                }
            }
            None => None,
        };

        if let Some(id) = target {
            match self.remote.deactivate(id).await {
                Ok(()) => info!("remote live record {} marked inactive", id),
                Err(err) => warn!("failed to deactivate remote record {}: {}", id, err),
            }
        }

        let _ = self.status.send(SyncStatus::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;
    use matchday_core::{GameSession, GameTimer, Half, TeamSize};

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<LocalStore>,
        remote: Arc<MemoryRemoteStore>,
        user_id: Uuid,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();

        Fixture {
            store: Arc::new(LocalStore::open(dir.path()).unwrap()),
            _dir: dir,
            remote: Arc::new(MemoryRemoteStore::new()),
            user_id: Uuid::new_v4(),
        }
    }

    fn sync_state(fx: &Fixture) -> (SyncState, watch::Receiver<SyncStatus>) {
        let (status_tx, status_rx) = watch::channel(SyncStatus::Idle);

        let state = SyncState {
            store: Arc::clone(&fx.store),
            remote: Arc::clone(&fx.remote) as Arc<dyn RemoteStore>,
            user_id: fx.user_id,
            record_id: None,
            stale_checked: false,
            status: status_tx,
        };

        (state, status_rx)
    }

    fn seed_running_game(fx: &Fixture) {
        let mut timer = GameTimer::new(9, String::from("team"), 25, Utc::now());
        timer.current_half = Half::First;
        timer.is_running = true;
        fx.store.save_timer(&timer).unwrap();

        fx.store
            .save_session(&GameSession::new(9, TeamSize::Sevens, Vec::new()))
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_tick_creates_one_active_record() {
        let fx = fixture();
        seed_running_game(&fx);

        let (mut state, status) = sync_state(&fx);
        state.tick().await;

        let records = fx.remote.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_active);
        assert_eq!(records[0].user_id, fx.user_id);
        assert_eq!(records[0].team_id, 9);
        assert_eq!(*status.borrow(), SyncStatus::Synced);

        // Second tick updates in place
        state.tick().await;
        assert_eq!(fx.remote.records().len(), 1);
    }

    #[tokio::test]
    async fn test_restart_resumes_existing_record() {
        let fx = fixture();
        seed_running_game(&fx);

        let (mut first_run, _status) = sync_state(&fx);
        first_run.tick().await;
        let original_id = fx.remote.records()[0].id;

        // A fresh synchronizer (app restart) must not duplicate the record
        let (mut second_run, _status) = sync_state(&fx);
        second_run.tick().await;

        let records = fx.remote.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, original_id);
    }

    #[tokio::test]
    async fn test_no_session_deactivates_and_forgets() {
        let fx = fixture();
        seed_running_game(&fx);

        let (mut state, status) = sync_state(&fx);
        state.tick().await;
        assert!(state.record_id.is_some());

        fx.store.clear().unwrap();
        state.tick().await;

        assert!(state.record_id.is_none());
        assert!(!fx.remote.records()[0].is_active);
        assert_eq!(*status.borrow(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_startup_sweep_deactivates_stale_record() {
        let fx = fixture();
        seed_running_game(&fx);

        // A previous run left an active record behind
        let (mut previous, _status) = sync_state(&fx);
        previous.tick().await;

        fx.store.clear().unwrap();

        let (mut state, _status) = sync_state(&fx);
        state.tick().await;

        assert!(!fx.remote.records()[0].is_active);
    }

    #[tokio::test]
    async fn test_paused_game_with_pending_plan_still_syncs() {
        let fx = fixture();

        let mut timer = GameTimer::new(9, String::from("team"), 25, Utc::now());
        timer.is_running = false;
        fx.store.save_timer(&timer).unwrap();

        let mut session = GameSession::new(9, TeamSize::Sevens, Vec::new());
        session.plan = vec![matchday_core::SubstitutionEvent::new(Half::First, 300, 1, 2)];
        session.auto_sub_active = true;
        fx.store.save_session(&session).unwrap();

        let (mut state, status) = sync_state(&fx);
        state.tick().await;

        assert_eq!(fx.remote.records().len(), 1);
        assert_eq!(*status.borrow(), SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_failed_write_invalidates_cached_id() {
        let fx = fixture();
        seed_running_game(&fx);

        let (mut state, status) = sync_state(&fx);
        state.tick().await;
        assert!(state.record_id.is_some());

        fx.remote.set_failing(true);
        state.tick().await;

        assert!(state.record_id.is_none());
        assert_eq!(*status.borrow(), SyncStatus::Failed);

        // Store healthy again: the next tick re-resolves by lookup instead
        // of inserting a duplicate
        fx.remote.set_failing(false);
        state.tick().await;

        assert_eq!(fx.remote.records().len(), 1);
        assert_eq!(*status.borrow(), SyncStatus::Synced);
    }
}
