use crate::remote::{NotificationKind, NotificationRecord, RemoteStore, RemoteStoreError};
use matchday_core::{DueSubstitutions, FinishedGame, GameSession};
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// On-device notification surface. Delivery is best effort: permissions,
/// user preference or platform quirks can all make it fail, and that is
/// fine — the durable record is what push delivery depends on.
pub trait LocalNotifier: Send + Sync {
    /// Returns whether the notification was handed to the platform.
    fn notify(&self, title: &str, body: &str, sound: bool) -> bool;
}

/// Default notifier for headless runs: writes the notification to the log.
pub struct LogNotifier;

impl LocalNotifier for LogNotifier {
    fn notify(&self, title: &str, body: &str, _sound: bool) -> bool {
        info!("notification: {} - {}", title, body);
        true
    }
}

/// Fires a local notification and writes the durable record for every due
/// event. The two channels are independent; failure of one never blocks
/// the other.
pub struct NotificationDispatcher {
    user_id: Uuid,
    remote: Arc<dyn RemoteStore>,
    local: Arc<dyn LocalNotifier>,
}

impl NotificationDispatcher {
    pub fn new(user_id: Uuid, remote: Arc<dyn RemoteStore>, local: Arc<dyn LocalNotifier>) -> Self {
        NotificationDispatcher {
            user_id,
            remote,
            local,
        }
    }

    pub async fn pending_sub(
        &self,
        due: &DueSubstitutions,
        session: &GameSession,
        sound_enabled: bool,
    ) {
        let message = Self::pending_sub_message(due, session);

        if !self.local.notify("Substitution due", &message, sound_enabled) {
            debug!("local substitution notification was not delivered");
        }

        self.write_durable(NotificationKind::PendingSub, message).await;
    }

    pub async fn game_finished(&self, finished: &FinishedGame) {
        let (own, opponent) = finished.score();
        let message = format!("Full time! Final score {}-{}", own, opponent);

        if !self.local.notify("Game finished", &message, true) {
            debug!("local full-time notification was not delivered");
        }

        self.write_durable(NotificationKind::GameFinished, message).await;
    }

    async fn write_durable(&self, kind: NotificationKind, message: String) {
        let record = NotificationRecord {
            user_id: self.user_id,
            kind,
            message,
            related_id: None,
        };

        if let Err(err) = self.remote.insert_notification(&record).await {
            match err {
                RemoteStoreError::Unavailable => {
                    warn!("durable notification dropped, remote store unavailable")
                }
                other => warn!("failed to write durable notification: {}", other),
            }
        }
    }

    fn pending_sub_message(due: &DueSubstitutions, session: &GameSession) -> String {
        let name = |id: u32| {
            session
                .player(id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| format!("#{}", id))
        };

        let mut message = format!(
            "{} comes on for {}",
            name(due.primary.player_in_id),
            name(due.primary.player_out_id)
        );

        if !due.additional.is_empty() {
            message.push_str(&format!(" (+{} more)", due.additional.len()));
        }

        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;
    use matchday_core::{Half, PositionCategory, SquadPlayer, SubstitutionEvent, TeamSize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RejectingNotifier {
        calls: AtomicUsize,
    }

    impl LocalNotifier for RejectingNotifier {
        fn notify(&self, _title: &str, _body: &str, _sound: bool) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    fn session() -> GameSession {
        let players = vec![
            SquadPlayer::new(1, "Sam", vec![PositionCategory::Midfielder]),
            SquadPlayer::new(2, "Alex", vec![PositionCategory::Midfielder]),
        ];
        GameSession::new(1, TeamSize::Sevens, players)
    }

    fn due() -> DueSubstitutions {
        DueSubstitutions {
            half: Half::First,
            time: 300,
            primary: SubstitutionEvent::new(Half::First, 300, 1, 2),
            additional: vec![SubstitutionEvent::new(Half::First, 300, 3, 4)],
        }
    }

    #[tokio::test]
    async fn test_durable_record_written_even_when_local_fails() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let local = Arc::new(RejectingNotifier {
            calls: AtomicUsize::new(0),
        });

        let dispatcher = NotificationDispatcher::new(
            Uuid::new_v4(),
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            local.clone(),
        );

        dispatcher.pending_sub(&due(), &session(), true).await;

        assert_eq!(local.calls.load(Ordering::SeqCst), 1);

        let written = remote.notifications();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].kind, NotificationKind::PendingSub);
        assert_eq!(written[0].message, "Alex comes on for Sam (+1 more)");
        assert!(written[0].related_id.is_none());
    }

    #[tokio::test]
    async fn test_remote_failure_does_not_panic() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.set_failing(true);

        let dispatcher = NotificationDispatcher::new(
            Uuid::new_v4(),
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::new(LogNotifier),
        );

        let finished = FinishedGame {
            total_seconds: 3000,
            players: Vec::new(),
            executed_subs: Vec::new(),
            goals: Vec::new(),
        };

        dispatcher.game_finished(&finished).await;
        assert!(remote.notifications().is_empty());
    }
}
