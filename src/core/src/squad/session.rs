use crate::rotation::SubstitutionEvent;
use crate::squad::SquadPlayer;
use crate::timer::Half;
use chrono::{DateTime, Utc};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Size code for small-sided and full-sided games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamSize {
    Fives,
    Sevens,
    Nines,
    Elevens,
}

impl TeamSize {
    pub fn on_pitch_count(&self) -> usize {
        match self {
            TeamSize::Fives => 5,
            TeamSize::Sevens => 7,
            TeamSize::Nines => 9,
            TeamSize::Elevens => 11,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub scorer_id: Option<u32>,
    pub time: u32,
    pub half: Half,
    pub opponent: bool,
}

/// The full session snapshot: roster, substitution plan and game bookkeeping.
///
/// This is the unit of local persistence and the unit mirrored to the remote
/// record. The executor always writes plan and roster changes back through a
/// single save of this struct, so readers never observe a half-applied
/// substitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub team_id: u32,
    pub players: Vec<SquadPlayer>,
    pub team_size: TeamSize,
    pub formation: Option<String>,
    pub ball_position: Option<Vector2<f32>>,
    pub plan: Vec<SubstitutionEvent>,
    pub auto_sub_active: bool,
    pub auto_sub_paused: bool,
    pub mock_mode: bool,
    pub last_update: DateTime<Utc>,
    pub linked_event_id: Option<String>,
    pub executed_subs: Vec<SubstitutionEvent>,
    pub goals: Vec<Goal>,
}

impl GameSession {
    pub fn new(team_id: u32, team_size: TeamSize, players: Vec<SquadPlayer>) -> Self {
        GameSession {
            team_id,
            players,
            team_size,
            formation: None,
            ball_position: None,
            plan: Vec::new(),
            auto_sub_active: false,
            auto_sub_paused: false,
            mock_mode: false,
            last_update: Utc::now(),
            linked_event_id: None,
            executed_subs: Vec::new(),
            goals: Vec::new(),
        }
    }

    pub fn player(&self, id: u32) -> Option<&SquadPlayer> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut SquadPlayer> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn on_pitch(&self) -> impl Iterator<Item = &SquadPlayer> {
        self.players.iter().filter(|p| p.is_on_pitch())
    }

    pub fn bench(&self) -> impl Iterator<Item = &SquadPlayer> {
        self.players.iter().filter(|p| !p.is_on_pitch())
    }

    pub fn has_pending_subs(&self) -> bool {
        self.plan.iter().any(|e| !e.executed)
    }

    pub fn record_goal(&mut self, goal: Goal) {
        self.goals.push(goal);
    }

    /// Running score as (own goals, opponent goals).
    pub fn score(&self) -> (usize, usize) {
        let own = self.goals.iter().filter(|g| !g.opponent).count();

        (own, self.goals.len() - own)
    }
}
