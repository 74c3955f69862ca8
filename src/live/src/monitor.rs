use crate::notify::NotificationDispatcher;
use crate::sync::SyncHandle;
use database::LocalStore;
use matchday_core::{BatchKey, FinishedGame, TriggerScan};
use chrono::Utc;
use log::{debug, error, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, MissedTickBehavior};

const MONITOR_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Whether the host application is in the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Foreground,
    Background,
}

impl Visibility {
    pub fn is_foreground(&self) -> bool {
        matches!(self, Visibility::Foreground)
    }
}

/// What the monitor surfaces to the external confirmation/completion UI.
#[derive(Debug)]
pub enum MonitorSignal {
    SubstitutionsDue(matchday_core::DueSubstitutions),
    FullTime(FinishedGame),
}

#[derive(Debug)]
pub enum MonitorCommand {
    /// The completion dialog was dismissed; a later session may announce
    /// full-time again.
    FullTimeDismissed,
}

/// Control surface for the running monitor task.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::UnboundedSender<MonitorCommand>,
}

impl MonitorHandle {
    pub fn full_time_dismissed(&self) {
        let _ = self.commands.send(MonitorCommand::FullTimeDismissed);
    }
}

/// Detects due substitutions and full-time without a running clock.
///
/// Each poll reloads both records and reconstructs elapsed time from the
/// stored counters, so the monitor survives suspension and restarts. It
/// polls only while the app is foregrounded, the editor view is closed
/// (an open editor runs its own in-view checks) and a qualifying session
/// exists; otherwise it sleeps until a store change or visibility change
/// wakes it.
pub struct TriggerMonitor {
    state: MonitorState,
    visibility: watch::Receiver<Visibility>,
    commands: mpsc::UnboundedReceiver<MonitorCommand>,
}

struct MonitorState {
    store: Arc<LocalStore>,
    dispatcher: Arc<NotificationDispatcher>,
    signals: mpsc::UnboundedSender<MonitorSignal>,
    sync: SyncHandle,
    last_batch: Option<BatchKey>,
    full_time_shown: bool,
}

impl TriggerMonitor {
    pub fn new(
        store: Arc<LocalStore>,
        dispatcher: Arc<NotificationDispatcher>,
        signals: mpsc::UnboundedSender<MonitorSignal>,
        visibility: watch::Receiver<Visibility>,
        sync: SyncHandle,
    ) -> (Self, MonitorHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let monitor = TriggerMonitor {
            state: MonitorState {
                store,
                dispatcher,
                signals,
                sync,
                last_batch: None,
                full_time_shown: false,
            },
            visibility,
            commands: command_rx,
        };

        (monitor, MonitorHandle {
            commands: command_tx,
        })
    }

    pub async fn run(self) {
        let TriggerMonitor {
            mut state,
            mut visibility,
            mut commands,
        } = self;

        let mut ticker = time::interval(MONITOR_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut changes = state.store.subscribe();

        loop {
            let active = visibility.borrow().is_foreground() && state.should_poll();

            tokio::select! {
                _ = ticker.tick(), if active => {
                    state.poll().await;
                }
                changed = changes.recv() => {
                    match changed {
                        // Next loop iteration re-evaluates whether to poll
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                changed = visibility.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if !visibility.borrow().is_foreground() {
                        debug!("app backgrounded, suspending substitution checks");
                        state.sync.request_flush();
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(MonitorCommand::FullTimeDismissed) => {
                            state.full_time_shown = false;
                        }
                        None => break,
                    }
                }
            }
        }
    }
}

impl MonitorState {
    /// The editor view owns its own checking loop while it is open; the
    /// monitor stands down for it.
    fn should_poll(&self) -> bool {
        if self.store.editor_open() {
            return false;
        }

        let (Some(timer), Some(session)) = (self.store.load_timer(), self.store.load_session())
        else {
            return false;
        };

        TriggerScan::session_qualifies(&session, &timer)
    }

    async fn poll(&mut self) {
        let Some(timer) = self.store.load_timer() else {
            return;
        };
        let Some(session) = self.store.load_session() else {
            return;
        };

        let now = Utc::now();

        if session.auto_sub_active && !session.auto_sub_paused {
            match TriggerScan::due_substitutions(&session, &timer, now) {
                Some(due) => {
                    let key = due.batch_key();

                    if self.last_batch != Some(key) {
                        debug!(
                            "{} substitution(s) due at {}s of half {}",
                            due.total(),
                            due.time,
                            due.half
                        );

                        self.last_batch = Some(key);
                        self.dispatcher
                            .pending_sub(&due, &session, timer.sound_enabled)
                            .await;

                        if self.signals.send(MonitorSignal::SubstitutionsDue(due)).is_err() {
                            warn!("no confirmation surface is listening for due substitutions");
                        }
                    }
                }
                // The batch resolved (confirmed, skipped or replanned)
                None => self.last_batch = None,
            }
        }

        if !self.full_time_shown {
            if let Some(finished) = TriggerScan::full_time(&session, &timer, now) {
                self.full_time_shown = true;

                // Mark the game over so the session stops qualifying
                let mut timer = timer;
                timer.finish(now);
                if let Err(err) = self.store.save_timer(&timer) {
                    error!("failed to persist finished timer: {}", err);
                }

                self.dispatcher.game_finished(&finished).await;

                if self.signals.send(MonitorSignal::FullTime(finished)).is_err() {
                    warn!("no completion surface is listening for full-time");
                }
            }
        }
    }
}
