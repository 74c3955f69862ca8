use crate::rotation::SubstitutionEvent;
use crate::squad::{PositionCategory, SquadPlayer, TeamSize};
use crate::timer::Half;
use itertools::Itertools;
use log::debug;

/// Minimum spacing between substitutions, used to bound how many are
/// feasible in the remaining time.
pub const MIN_SUB_SPACING_SECS: u32 = 120;

/// Everything the planner needs to know about the game in progress.
pub struct RotationRequest<'p> {
    pub players: &'p [SquadPlayer],
    pub team_size: TeamSize,
    pub half_duration_seconds: u32,
    pub elapsed_seconds: u32,
    pub current_half: Half,
}

#[derive(Debug, Clone)]
struct PitchCandidate {
    id: u32,
    eligible: Vec<PositionCategory>,
    category: PositionCategory,
    seconds_played: u32,
}

#[derive(Debug, Clone)]
struct BenchCandidate {
    id: u32,
    eligible: Vec<PositionCategory>,
    seconds_played: u32,
}

/// Builds a time-ordered substitution schedule that approximates equal
/// playing time across outfield players while respecting each player's
/// eligible positions.
///
/// Goalkeepers stay out of the rotation pool; a single half-time keeper
/// swap is scheduled when a dedicated reserve keeper is available.
pub struct RotationPlanner;

impl RotationPlanner {
    pub fn plan(request: &RotationRequest<'_>) -> Vec<SubstitutionEvent> {
        let mut events = Vec::new();

        if let Some(swap) = Self::goalkeeper_half_time_swap(request) {
            events.push(swap);
        }

        let mut pitch: Vec<PitchCandidate> = request
            .players
            .iter()
            .filter(|p| p.is_on_pitch())
            .filter(|p| p.current_category != Some(PositionCategory::Goalkeeper))
            .filter_map(|p| {
                Some(PitchCandidate {
                    id: p.id,
                    eligible: p.eligible_positions.clone(),
                    category: p.current_category?,
                    seconds_played: p.seconds_played,
                })
            })
            .collect();

        let mut bench: Vec<BenchCandidate> = request
            .players
            .iter()
            .filter(|p| !p.is_on_pitch() && !p.is_goalkeeper_only() && !p.is_injured)
            .map(|p| BenchCandidate {
                id: p.id,
                eligible: p.eligible_positions.clone(),
                seconds_played: p.seconds_played,
            })
            .collect();

        let expected_outfield = request.team_size.on_pitch_count().saturating_sub(1);
        if pitch.len() != expected_outfield {
            debug!(
                "on-pitch outfield count {} does not match team size {}",
                pitch.len(),
                request.team_size.on_pitch_count()
            );
        }

        let remaining = Self::remaining_seconds(request);

        if pitch.is_empty() || bench.is_empty() || remaining == 0 {
            return Self::sorted(events);
        }

        let subs_needed = (remaining / MIN_SUB_SPACING_SECS).min(bench.len() as u32);
        if subs_needed == 0 {
            return Self::sorted(events);
        }

        // Spread the events across the window so the last one still lands
        // strictly before full-time.
        let spacing = remaining / (subs_needed + 1);

        debug!(
            "scheduling {} substitutions, {} seconds apart, {} seconds remaining",
            subs_needed, spacing, remaining
        );

        for index in 1..=subs_needed {
            let (half, time) = Self::slot_at(request, spacing * index);

            if let Some(event) = Self::select_swap(&mut pitch, &mut bench, half, time) {
                events.push(event);
            }
        }

        Self::sorted(events)
    }

    fn sorted(mut events: Vec<SubstitutionEvent>) -> Vec<SubstitutionEvent> {
        events.sort_by_key(|e| e.schedule_key());
        events
    }

    /// Total seconds left to play: the remainder of the current half plus
    /// the whole second half when the game is still in half one.
    fn remaining_seconds(request: &RotationRequest<'_>) -> u32 {
        let left_in_half = request
            .half_duration_seconds
            .saturating_sub(request.elapsed_seconds);

        match request.current_half {
            Half::First => left_in_half + request.half_duration_seconds,
            Half::Second => left_in_half,
        }
    }

    /// Converts an offset from "now" into a `(half, time)` slot, crossing
    /// the half boundary when needed.
    fn slot_at(request: &RotationRequest<'_>, offset: u32) -> (Half, u32) {
        let absolute = request.elapsed_seconds + offset;

        match request.current_half {
            Half::First if absolute >= request.half_duration_seconds => {
                (Half::Second, absolute - request.half_duration_seconds)
            }
            half => (half, absolute),
        }
    }

    fn goalkeeper_half_time_swap(request: &RotationRequest<'_>) -> Option<SubstitutionEvent> {
        // A half-time swap planned during the second half would be in the past
        if request.current_half != Half::First {
            return None;
        }

        let keeper = request
            .players
            .iter()
            .find(|p| p.current_category == Some(PositionCategory::Goalkeeper))?;

        let reserve = request
            .players
            .iter()
            .filter(|p| !p.is_on_pitch() && p.is_goalkeeper_only() && !p.is_injured)
            .sorted_by_key(|p| p.seconds_played)
            .next()?;

        Some(SubstitutionEvent::new(Half::Second, 0, keeper.id, reserve.id))
    }

    /// Picks the next swap and updates the working occupancy view so later
    /// slots never reuse a player inconsistently.
    ///
    /// Selection runs in fairness order: most-rested bench player against
    /// longest-serving on-pitch player, direct swap first, then a chained
    /// swap through a third player, then the same two checks over every
    /// remaining pair. When nothing is eligible the top pairing is swapped
    /// unconditionally rather than stalling the rotation.
    fn select_swap(
        pitch: &mut Vec<PitchCandidate>,
        bench: &mut Vec<BenchCandidate>,
        half: Half,
        time: u32,
    ) -> Option<SubstitutionEvent> {
        if pitch.is_empty() || bench.is_empty() {
            return None;
        }

        bench.sort_by_key(|c| c.seconds_played);
        pitch.sort_by(|a, b| b.seconds_played.cmp(&a.seconds_played));

        for bench_idx in 0..bench.len() {
            for pitch_idx in 0..pitch.len() {
                let vacated = pitch[pitch_idx].category;

                if bench[bench_idx].eligible.contains(&vacated) {
                    return Some(Self::commit_direct(pitch, bench, pitch_idx, bench_idx, half, time));
                }

                let chained = (0..pitch.len()).find(|&idx| {
                    idx != pitch_idx
                        && bench[bench_idx].eligible.contains(&pitch[idx].category)
                        && pitch[idx].eligible.contains(&vacated)
                });

                if let Some(swap_idx) = chained {
                    return Some(Self::commit_chained(
                        pitch, bench, pitch_idx, bench_idx, swap_idx, half, time,
                    ));
                }
            }
        }

        debug!(
            "no eligible pairing for bench player {}, swapping unconditionally",
            bench[0].id
        );

        Some(Self::commit_direct(pitch, bench, 0, 0, half, time))
    }

    fn commit_direct(
        pitch: &mut Vec<PitchCandidate>,
        bench: &mut Vec<BenchCandidate>,
        pitch_idx: usize,
        bench_idx: usize,
        half: Half,
        time: u32,
    ) -> SubstitutionEvent {
        let out = pitch.remove(pitch_idx);
        let incoming = bench.remove(bench_idx);

        let event = SubstitutionEvent::new(half, time, out.id, incoming.id);

        pitch.push(PitchCandidate {
            id: incoming.id,
            eligible: incoming.eligible,
            category: out.category,
            seconds_played: incoming.seconds_played,
        });
        bench.push(BenchCandidate {
            id: out.id,
            eligible: out.eligible,
            seconds_played: out.seconds_played,
        });

        event
    }

    fn commit_chained(
        pitch: &mut Vec<PitchCandidate>,
        bench: &mut Vec<BenchCandidate>,
        pitch_idx: usize,
        bench_idx: usize,
        swap_idx: usize,
        half: Half,
        time: u32,
    ) -> SubstitutionEvent {
        let vacated = pitch[pitch_idx].category;
        let swap_id = pitch[swap_idx].id;
        let inherited = pitch[swap_idx].category;

        // The third player shifts into the vacated slot, the incoming player
        // takes theirs.
        pitch[swap_idx].category = vacated;

        let out = pitch.remove(pitch_idx);
        let incoming = bench.remove(bench_idx);

        let event =
            SubstitutionEvent::with_position_swap(half, time, out.id, incoming.id, swap_id);

        pitch.push(PitchCandidate {
            id: incoming.id,
            eligible: incoming.eligible,
            category: inherited,
            seconds_played: incoming.seconds_played,
        });
        bench.push(BenchCandidate {
            id: out.id,
            eligible: out.eligible,
            seconds_played: out.seconds_played,
        });

        event
    }
}
