use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionCategory {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl PositionCategory {
    pub fn get_short_name(&self) -> &'static str {
        match self {
            PositionCategory::Goalkeeper => "GK",
            PositionCategory::Defender => "DEF",
            PositionCategory::Midfielder => "MID",
            PositionCategory::Forward => "FWD",
        }
    }
}

/// A rostered player in a live game session.
///
/// Invariant: a player is on the pitch iff `pitch_position` is set, and
/// `current_category` is set iff the player is on the pitch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadPlayer {
    pub id: u32,
    pub name: String,
    pub shirt_number: Option<u8>,
    pub pitch_position: Option<Vector2<f32>>,
    pub eligible_positions: Vec<PositionCategory>,
    pub current_category: Option<PositionCategory>,
    pub seconds_played: u32,
    pub is_injured: bool,
    pub is_fill_in: bool,
}

impl SquadPlayer {
    pub fn new(id: u32, name: &str, eligible_positions: Vec<PositionCategory>) -> Self {
        SquadPlayer {
            id,
            name: String::from(name),
            shirt_number: None,
            pitch_position: None,
            eligible_positions,
            current_category: None,
            seconds_played: 0,
            is_injured: false,
            is_fill_in: false,
        }
    }

    pub fn is_on_pitch(&self) -> bool {
        self.pitch_position.is_some()
    }

    pub fn can_play(&self, category: PositionCategory) -> bool {
        self.eligible_positions.contains(&category)
    }

    /// True for players who can only keep goal. They are handled by the
    /// fixed half-time swap rule and never enter the outfield rotation.
    pub fn is_goalkeeper_only(&self) -> bool {
        self.eligible_positions == [PositionCategory::Goalkeeper]
    }

    pub fn move_to_pitch(&mut self, position: Vector2<f32>, category: PositionCategory) {
        self.pitch_position = Some(position);
        self.current_category = Some(category);
    }

    pub fn move_to_bench(&mut self) {
        self.pitch_position = None;
        self.current_category = None;
    }
}
