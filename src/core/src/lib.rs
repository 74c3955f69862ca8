pub mod executor;
pub mod rotation;
pub mod squad;
pub mod timer;
pub mod triggers;

pub use executor::{ConfirmOutcome, SkipOutcome, SubstitutionExecutor};
pub use rotation::{MIN_SUB_SPACING_SECS, RotationPlanner, RotationRequest, SubstitutionEvent};
pub use squad::{GameSession, Goal, PositionCategory, SquadPlayer, TeamSize};
pub use timer::{GameTimer, Half};
pub use triggers::{BatchKey, DueSubstitutions, FinishedGame, TriggerScan};

pub use nalgebra::Vector2;
