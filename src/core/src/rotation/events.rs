use crate::timer::Half;
use serde::{Deserialize, Serialize};

/// A scheduled substitution: `player_in_id` comes on for `player_out_id`
/// at `time` seconds into `half`.
///
/// `position_swap_id` names a third on-pitch player who shifts into the
/// vacated position so the incoming player lands in a slot they are
/// eligible for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstitutionEvent {
    pub time: u32,
    pub half: Half,
    pub player_out_id: u32,
    pub player_in_id: u32,
    pub position_swap_id: Option<u32>,
    pub executed: bool,
}

impl SubstitutionEvent {
    pub fn new(half: Half, time: u32, player_out_id: u32, player_in_id: u32) -> Self {
        SubstitutionEvent {
            time,
            half,
            player_out_id,
            player_in_id,
            position_swap_id: None,
            executed: false,
        }
    }

    pub fn with_position_swap(
        half: Half,
        time: u32,
        player_out_id: u32,
        player_in_id: u32,
        position_swap_id: u32,
    ) -> Self {
        SubstitutionEvent {
            time,
            half,
            player_out_id,
            player_in_id,
            position_swap_id: Some(position_swap_id),
            executed: false,
        }
    }

    pub fn schedule_key(&self) -> (Half, u32) {
        (self.half, self.time)
    }

    /// Identity used when a confirmation surface hands an event back:
    /// the scheduled slot plus both player ids.
    pub fn same_schedule(&self, other: &SubstitutionEvent) -> bool {
        self.half == other.half
            && self.time == other.time
            && self.player_out_id == other.player_out_id
            && self.player_in_id == other.player_in_id
    }
}
