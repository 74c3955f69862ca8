pub mod events;
pub mod planner;

pub use events::SubstitutionEvent;
pub use planner::{MIN_SUB_SPACING_SECS, RotationPlanner, RotationRequest};
