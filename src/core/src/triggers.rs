use crate::rotation::SubstitutionEvent;
use crate::squad::{GameSession, Goal, SquadPlayer};
use crate::timer::{GameTimer, Half};
use chrono::{DateTime, Utc};
use itertools::Itertools;

/// Identity of a due batch. The monitor remembers the last key it signaled
/// so an unresolved batch is not re-signaled on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchKey {
    pub half: Half,
    pub time: u32,
    pub size: usize,
}

/// All substitutions that became due at the same earliest moment: one
/// primary prompt plus any additional events batched with it.
#[derive(Debug, Clone)]
pub struct DueSubstitutions {
    pub half: Half,
    pub time: u32,
    pub primary: SubstitutionEvent,
    pub additional: Vec<SubstitutionEvent>,
}

impl DueSubstitutions {
    /// Number of substitutions in the batch, primary included.
    pub fn total(&self) -> usize {
        1 + self.additional.len()
    }

    pub fn batch_key(&self) -> BatchKey {
        BatchKey {
            half: self.half,
            time: self.time,
            size: self.total(),
        }
    }
}

/// Summary handed to the completion surface when the game ends.
#[derive(Debug, Clone)]
pub struct FinishedGame {
    pub total_seconds: u32,
    pub players: Vec<SquadPlayer>,
    pub executed_subs: Vec<SubstitutionEvent>,
    pub goals: Vec<Goal>,
}

impl FinishedGame {
    /// Final score as (own goals, opponent goals).
    pub fn score(&self) -> (usize, usize) {
        let own = self.goals.iter().filter(|g| !g.opponent).count();

        (own, self.goals.len() - own)
    }
}

/// Stateless due-detection over a session snapshot and reconstructed time.
pub struct TriggerScan;

impl TriggerScan {
    /// Unexecuted plan entries in the current half whose scheduled time has
    /// been reached, batched at the earliest due moment.
    pub fn due_substitutions(
        session: &GameSession,
        timer: &GameTimer,
        now: DateTime<Utc>,
    ) -> Option<DueSubstitutions> {
        let elapsed = timer.elapsed_now(now);

        let due = session
            .plan
            .iter()
            .filter(|e| !e.executed && e.half == timer.current_half && e.time <= elapsed)
            .sorted_by_key(|e| e.time)
            .collect_vec();

        let earliest = due.first()?.time;

        let mut batch = due
            .into_iter()
            .filter(|e| e.time == earliest)
            .cloned();

        let primary = batch.next()?;
        let additional: Vec<SubstitutionEvent> = batch.collect();

        Some(DueSubstitutions {
            half: timer.current_half,
            time: earliest,
            primary,
            additional,
        })
    }

    /// Full-time check: second half played out to the whistle.
    pub fn full_time(
        session: &GameSession,
        timer: &GameTimer,
        now: DateTime<Utc>,
    ) -> Option<FinishedGame> {
        if timer.current_half != Half::Second {
            return None;
        }

        if timer.elapsed_now(now) < timer.half_duration_seconds() {
            return None;
        }

        Some(FinishedGame {
            total_seconds: 2 * timer.half_duration_seconds(),
            players: session.players.clone(),
            executed_subs: session.executed_subs.clone(),
            goals: session.goals.clone(),
        })
    }

    /// A session qualifies for background monitoring while the clock runs
    /// or an active, unpaused plan still has pending entries.
    pub fn session_qualifies(session: &GameSession, timer: &GameTimer) -> bool {
        timer.is_running
            || (session.auto_sub_active && !session.auto_sub_paused && session.has_pending_subs())
    }
}
