pub mod player;
pub mod session;

pub use player::{PositionCategory, SquadPlayer};
pub use session::{GameSession, Goal, TeamSize};
