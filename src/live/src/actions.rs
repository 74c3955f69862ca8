use matchday_core::{ConfirmOutcome, Goal, SkipOutcome, SubstitutionEvent, SubstitutionExecutor};
use chrono::Utc;
use database::LocalStore;
use log::error;
use std::sync::Arc;

/// Entry points for the confirmation surface and match-day controls.
///
/// Every action re-reads the current records before mutating and persists
/// the whole session in a single save, so the plan and the roster can
/// never be observed half-applied by the polling loops.
pub struct GameActions {
    store: Arc<LocalStore>,
}

impl GameActions {
    pub fn new(store: Arc<LocalStore>) -> Self {
        GameActions { store }
    }

    /// Applies a confirmed substitution. Returns `None` when no session
    /// exists any more.
    pub fn confirm_substitution(&self, event: &SubstitutionEvent) -> Option<ConfirmOutcome> {
        let mut session = self.store.load_session()?;

        let outcome = SubstitutionExecutor::confirm(&mut session, event);

        if outcome != ConfirmOutcome::NotFound {
            session.last_update = Utc::now();
            self.persist(&session);
        }

        Some(outcome)
    }

    /// Skips a substitution and rebalances the remaining plan.
    pub fn skip_substitution(&self, event: &SubstitutionEvent) -> Option<SkipOutcome> {
        let mut session = self.store.load_session()?;
        let timer = self.store.load_timer()?;

        let outcome = SubstitutionExecutor::skip(&mut session, &timer, event, Utc::now());

        if outcome != SkipOutcome::NotFound {
            session.last_update = Utc::now();
            self.persist(&session);
        }

        Some(outcome)
    }

    pub fn record_goal(&self, goal: Goal) -> bool {
        let Some(mut session) = self.store.load_session() else {
            return false;
        };

        session.record_goal(goal);
        session.last_update = Utc::now();
        self.persist(&session);

        true
    }

    pub fn start_timer(&self) -> bool {
        self.with_timer(|timer, now| timer.start(now))
    }

    pub fn pause_timer(&self) -> bool {
        self.with_timer(|timer, now| timer.pause(now))
    }

    pub fn advance_half(&self) -> bool {
        self.with_timer(|timer, now| timer.advance_half(now))
    }

    /// Tears the local session down entirely.
    pub fn close_game(&self) {
        if let Err(err) = self.store.clear() {
            error!("failed to clear game records: {}", err);
        }
    }

    fn with_timer(&self, mutate: impl FnOnce(&mut matchday_core::GameTimer, chrono::DateTime<Utc>)) -> bool {
        let Some(mut timer) = self.store.load_timer() else {
            return false;
        };

        mutate(&mut timer, Utc::now());

        if let Err(err) = self.store.save_timer(&timer) {
            error!("failed to persist timer record: {}", err);
            return false;
        }

        true
    }

    fn persist(&self, session: &matchday_core::GameSession) {
        if let Err(err) = self.store.save_session(session) {
            error!("failed to persist session record: {}", err);
        }
    }
}
