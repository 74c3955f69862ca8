use crate::rotation::{RotationPlanner, RotationRequest, SubstitutionEvent};
use crate::squad::GameSession;
use crate::timer::GameTimer;
use chrono::{DateTime, Utc};
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Roster mutated as planned.
    Applied,
    /// The planned third player had left the pitch; a plain two-way swap
    /// was applied instead.
    AppliedWithoutPositionSwap,
    /// The roster no longer matched the event. The event was marked
    /// executed but the roster was left untouched.
    StaleState,
    /// No matching unexecuted event; nothing happened.
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    /// Event removed and the remaining plan rebuilt.
    Recalculated,
    /// Event removed; no bench players were left to replan with.
    Removed,
    /// No matching unexecuted event; nothing happened.
    NotFound,
}

/// Applies confirmed or skipped substitutions against a freshly loaded
/// session.
///
/// The roster may have changed between scheduling and confirmation (manual
/// edits in the editor view), so both players are re-validated against the
/// current snapshot before anything is mutated. Callers persist the session
/// in a single save afterwards, keeping plan and roster changes atomic for
/// other readers.
pub struct SubstitutionExecutor;

impl SubstitutionExecutor {
    pub fn confirm(session: &mut GameSession, event: &SubstitutionEvent) -> ConfirmOutcome {
        let Some(index) = session
            .plan
            .iter()
            .position(|e| !e.executed && e.same_schedule(event))
        else {
            return ConfirmOutcome::NotFound;
        };

        let incoming_on_bench = session
            .player(event.player_in_id)
            .is_some_and(|p| !p.is_on_pitch());
        let outgoing_slot = session
            .player(event.player_out_id)
            .and_then(|p| Some((p.pitch_position?, p.current_category?)));

        let (Some((out_position, out_category)), true) = (outgoing_slot, incoming_on_bench) else {
            warn!(
                "substitution {} -> {} no longer matches the roster, marking executed without applying",
                event.player_out_id, event.player_in_id
            );
            Self::mark_executed(session, index);
            return ConfirmOutcome::StaleState;
        };

        let swap_slot = event
            .position_swap_id
            .and_then(|id| session.player(id))
            .and_then(|p| Some((p.id, p.pitch_position?, p.current_category?)));

        let mut outcome = ConfirmOutcome::Applied;

        match (event.position_swap_id, swap_slot) {
            (Some(_), Some((swap_id, swap_position, swap_category))) => {
                // Three-way: out to the bench, the third player into the
                // vacated slot, the incoming player into the third's slot.
                if let Some(outgoing) = session.player_mut(event.player_out_id) {
                    outgoing.move_to_bench();
                }
                if let Some(swapper) = session.player_mut(swap_id) {
                    swapper.move_to_pitch(out_position, out_category);
                }
                if let Some(incoming) = session.player_mut(event.player_in_id) {
                    incoming.move_to_pitch(swap_position, swap_category);
                }
            }
            (Some(missing), None) => {
                debug!(
                    "position swap player {} is no longer on the pitch, applying a plain swap",
                    missing
                );
                Self::apply_two_way(session, event, out_position, out_category);
                outcome = ConfirmOutcome::AppliedWithoutPositionSwap;
            }
            (None, _) => {
                Self::apply_two_way(session, event, out_position, out_category);
            }
        }

        Self::mark_executed(session, index);
        outcome
    }

    /// Removes the skipped event and rebuilds the remaining plan so the
    /// rotation stays fair for everyone still waiting.
    pub fn skip(
        session: &mut GameSession,
        timer: &GameTimer,
        event: &SubstitutionEvent,
        now: DateTime<Utc>,
    ) -> SkipOutcome {
        let Some(index) = session
            .plan
            .iter()
            .position(|e| !e.executed && e.same_schedule(event))
        else {
            return SkipOutcome::NotFound;
        };

        session.plan.remove(index);

        let has_bench = session
            .players
            .iter()
            .any(|p| !p.is_on_pitch() && !p.is_goalkeeper_only() && !p.is_injured);

        if !has_bench {
            return SkipOutcome::Removed;
        }

        let request = RotationRequest {
            players: &session.players,
            team_size: session.team_size,
            half_duration_seconds: timer.half_duration_seconds(),
            elapsed_seconds: timer.elapsed_now(now),
            current_half: timer.current_half,
        };

        let fresh = RotationPlanner::plan(&request);

        session.plan.retain(|e| e.executed);
        session.plan.extend(fresh);
        session.plan.sort_by_key(|e| e.schedule_key());

        SkipOutcome::Recalculated
    }

    fn apply_two_way(
        session: &mut GameSession,
        event: &SubstitutionEvent,
        out_position: nalgebra::Vector2<f32>,
        out_category: crate::squad::PositionCategory,
    ) {
        if let Some(outgoing) = session.player_mut(event.player_out_id) {
            outgoing.move_to_bench();
        }
        if let Some(incoming) = session.player_mut(event.player_in_id) {
            incoming.move_to_pitch(out_position, out_category);
        }
    }

    fn mark_executed(session: &mut GameSession, index: usize) {
        session.plan[index].executed = true;
        session.executed_subs.push(session.plan[index].clone());

        if !session.has_pending_subs() {
            session.auto_sub_active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squad::{PositionCategory, SquadPlayer, TeamSize};
    use crate::timer::Half;
    use nalgebra::Vector2;

    fn roster() -> Vec<SquadPlayer> {
        use PositionCategory::*;

        let mut keeper = SquadPlayer::new(1, "keeper", vec![Goalkeeper]);
        keeper.move_to_pitch(Vector2::new(5.0, 30.0), Goalkeeper);

        let mut defender = SquadPlayer::new(2, "defender", vec![Defender, Midfielder]);
        defender.move_to_pitch(Vector2::new(20.0, 30.0), Defender);
        defender.seconds_played = 600;

        let mut midfielder = SquadPlayer::new(3, "midfielder", vec![Midfielder]);
        midfielder.move_to_pitch(Vector2::new(45.0, 30.0), Midfielder);
        midfielder.seconds_played = 700;

        let fresh_mid = SquadPlayer::new(4, "fresh-mid", vec![Midfielder]);
        let fresh_def = SquadPlayer::new(5, "fresh-def", vec![Defender]);

        vec![keeper, defender, midfielder, fresh_mid, fresh_def]
    }

    fn session_with_plan(plan: Vec<SubstitutionEvent>) -> GameSession {
        let mut session = GameSession::new(1, TeamSize::Fives, roster());
        session.plan = plan;
        session.auto_sub_active = true;
        session
    }

    fn player_ids(session: &GameSession) -> Vec<u32> {
        let mut ids: Vec<u32> = session.players.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids
    }

    fn timer() -> GameTimer {
        let mut timer = GameTimer::new(1, String::from("team"), 25, Utc::now());
        timer.current_half = Half::Second;
        timer.elapsed_seconds = 300;
        timer
    }

    #[test]
    fn test_confirm_applies_two_way_swap() {
        let event = SubstitutionEvent::new(Half::Second, 300, 3, 4);
        let mut session = session_with_plan(vec![event.clone()]);

        let outcome = SubstitutionExecutor::confirm(&mut session, &event);

        assert_eq!(outcome, ConfirmOutcome::Applied);
        assert!(!session.player(3).unwrap().is_on_pitch());

        let incoming = session.player(4).unwrap();
        assert!(incoming.is_on_pitch());
        assert_eq!(incoming.current_category, Some(PositionCategory::Midfielder));
        assert_eq!(incoming.pitch_position, Some(Vector2::new(45.0, 30.0)));

        assert!(session.plan[0].executed);
        assert_eq!(session.executed_subs.len(), 1);
        assert!(!session.auto_sub_active); // nothing pending anymore
    }

    #[test]
    fn test_confirm_applies_three_way_swap() {
        // Fresh defender comes on; on-pitch defender shifts to midfield
        let event = SubstitutionEvent::with_position_swap(Half::Second, 300, 3, 5, 2);
        let mut session = session_with_plan(vec![event.clone()]);

        let outcome = SubstitutionExecutor::confirm(&mut session, &event);

        assert_eq!(outcome, ConfirmOutcome::Applied);
        assert!(!session.player(3).unwrap().is_on_pitch());

        let swapper = session.player(2).unwrap();
        assert_eq!(swapper.current_category, Some(PositionCategory::Midfielder));
        assert_eq!(swapper.pitch_position, Some(Vector2::new(45.0, 30.0)));

        let incoming = session.player(5).unwrap();
        assert_eq!(incoming.current_category, Some(PositionCategory::Defender));
        assert_eq!(incoming.pitch_position, Some(Vector2::new(20.0, 30.0)));
    }

    #[test]
    fn test_confirm_degrades_when_swap_player_left_the_pitch() {
        let event = SubstitutionEvent::with_position_swap(Half::Second, 300, 3, 5, 2);
        let mut session = session_with_plan(vec![event.clone()]);
        session.player_mut(2).unwrap().move_to_bench();

        let outcome = SubstitutionExecutor::confirm(&mut session, &event);

        assert_eq!(outcome, ConfirmOutcome::AppliedWithoutPositionSwap);

        let incoming = session.player(5).unwrap();
        assert_eq!(incoming.current_category, Some(PositionCategory::Midfielder));
        assert_eq!(incoming.pitch_position, Some(Vector2::new(45.0, 30.0)));
    }

    #[test]
    fn test_stale_confirm_marks_executed_without_mutation() {
        let event = SubstitutionEvent::new(Half::Second, 300, 3, 4);
        let mut session = session_with_plan(vec![event.clone()]);

        // Incoming player was manually dragged onto the pitch meanwhile
        session
            .player_mut(4)
            .unwrap()
            .move_to_pitch(Vector2::new(60.0, 20.0), PositionCategory::Midfielder);

        let on_pitch_before: Vec<u32> = session.on_pitch().map(|p| p.id).collect();

        let outcome = SubstitutionExecutor::confirm(&mut session, &event);

        assert_eq!(outcome, ConfirmOutcome::StaleState);
        assert!(session.plan[0].executed);

        let on_pitch_after: Vec<u32> = session.on_pitch().map(|p| p.id).collect();
        assert_eq!(on_pitch_before, on_pitch_after);
    }

    #[test]
    fn test_confirm_twice_is_a_no_op() {
        let event = SubstitutionEvent::new(Half::Second, 300, 3, 4);
        let mut session = session_with_plan(vec![event.clone()]);

        assert_eq!(
            SubstitutionExecutor::confirm(&mut session, &event),
            ConfirmOutcome::Applied
        );

        let snapshot: Vec<u32> = session.on_pitch().map(|p| p.id).collect();

        assert_eq!(
            SubstitutionExecutor::confirm(&mut session, &event),
            ConfirmOutcome::NotFound
        );

        let after: Vec<u32> = session.on_pitch().map(|p| p.id).collect();
        assert_eq!(snapshot, after);
        assert_eq!(session.executed_subs.len(), 1);
    }

    #[test]
    fn test_skip_recalculates_and_preserves_headcount() {
        let event = SubstitutionEvent::new(Half::Second, 300, 3, 4);
        let mut session = session_with_plan(vec![event.clone()]);
        let ids_before = player_ids(&session);

        let outcome = SubstitutionExecutor::skip(&mut session, &timer(), &event, Utc::now());

        assert_eq!(outcome, SkipOutcome::Recalculated);
        assert_eq!(player_ids(&session), ids_before);

        // The skipped slot is gone but the rotation continues
        assert!(session.plan.iter().all(|e| !e.executed));
        for pair in session.plan.windows(2) {
            assert!(pair[0].schedule_key() <= pair[1].schedule_key());
        }
    }

    #[test]
    fn test_skip_with_empty_bench_just_removes() {
        let event = SubstitutionEvent::new(Half::Second, 300, 3, 4);
        let mut session = session_with_plan(vec![event.clone()]);

        // Everyone onto the pitch: no bench left
        session
            .player_mut(4)
            .unwrap()
            .move_to_pitch(Vector2::new(60.0, 20.0), PositionCategory::Midfielder);
        session
            .player_mut(5)
            .unwrap()
            .move_to_pitch(Vector2::new(70.0, 20.0), PositionCategory::Defender);

        let outcome = SubstitutionExecutor::skip(&mut session, &timer(), &event, Utc::now());

        assert_eq!(outcome, SkipOutcome::Removed);
        assert!(session.plan.is_empty());
    }

    #[test]
    fn test_skip_unknown_event_is_not_found() {
        let event = SubstitutionEvent::new(Half::Second, 300, 3, 4);
        let mut session = session_with_plan(vec![]);

        assert_eq!(
            SubstitutionExecutor::skip(&mut session, &timer(), &event, Utc::now()),
            SkipOutcome::NotFound
        );
    }
}
