use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One of the two fixed-length game periods.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Half {
    First,
    Second,
}

impl Half {
    pub fn number(&self) -> u8 {
        match self {
            Half::First => 1,
            Half::Second => 2,
        }
    }
}

impl TryFrom<u8> for Half {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Half::First),
            2 => Ok(Half::Second),
            other => Err(format!("invalid half number: {}", other)),
        }
    }
}

impl From<Half> for u8 {
    fn from(half: Half) -> u8 {
        half.number()
    }
}

impl Display for Half {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// The persisted timer record for a live game.
///
/// The timer never relies on a live interval continuing to fire: elapsed
/// "now" time is always reconstructed from `elapsed_seconds`, `is_running`
/// and the wall-clock delta since `last_update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameTimer {
    pub team_id: u32,
    pub team_name: String,
    pub minutes_per_half: u32,
    pub current_half: Half,
    pub elapsed_seconds: u32,
    pub is_running: bool,
    pub sound_enabled: bool,
    pub last_update: DateTime<Utc>,
}

impl GameTimer {
    pub fn new(team_id: u32, team_name: String, minutes_per_half: u32, now: DateTime<Utc>) -> Self {
        GameTimer {
            team_id,
            team_name,
            minutes_per_half,
            current_half: Half::First,
            elapsed_seconds: 0,
            is_running: false,
            sound_enabled: true,
            last_update: now,
        }
    }

    pub fn half_duration_seconds(&self) -> u32 {
        self.minutes_per_half * 60
    }

    /// Seconds elapsed in the current half as of `now`.
    ///
    /// The wall-clock delta is clamped at zero so a skewed clock can never
    /// run the game backwards.
    pub fn elapsed_now(&self, now: DateTime<Utc>) -> u32 {
        if !self.is_running {
            return self.elapsed_seconds;
        }

        let delta = (now - self.last_update).num_seconds().max(0) as u32;

        self.elapsed_seconds + delta
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.is_running {
            return;
        }

        self.is_running = true;
        self.last_update = now;
    }

    /// Folds the running delta into `elapsed_seconds` and stops the clock.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.elapsed_seconds = self.elapsed_now(now);
        self.is_running = false;
        self.last_update = now;
    }

    /// Moves to the second half. Elapsed time resets, the clock stays
    /// stopped until the half is explicitly started.
    pub fn advance_half(&mut self, now: DateTime<Utc>) {
        self.current_half = Half::Second;
        self.elapsed_seconds = 0;
        self.is_running = false;
        self.last_update = now;
    }

    /// Marks the game over: clock stopped, elapsed pinned to the half length.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.elapsed_seconds = self.half_duration_seconds();
        self.is_running = false;
        self.last_update = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn timer(now: DateTime<Utc>) -> GameTimer {
        GameTimer::new(1, String::from("Harriers U9"), 25, now)
    }

    #[test]
    fn test_paused_timer_ignores_wall_clock() {
        let now = Utc::now();
        let mut timer = timer(now);
        timer.elapsed_seconds = 300;

        let much_later = now + TimeDelta::hours(6);
        assert_eq!(timer.elapsed_now(much_later), 300);
    }

    #[test]
    fn test_running_timer_reconstructs_from_wall_clock() {
        let now = Utc::now();
        let mut timer = timer(now);
        timer.start(now);

        assert_eq!(timer.elapsed_now(now + TimeDelta::seconds(90)), 90);
    }

    #[test]
    fn test_pause_folds_delta() {
        let now = Utc::now();
        let mut timer = timer(now);
        timer.start(now);

        let later = now + TimeDelta::seconds(120);
        timer.pause(later);

        assert_eq!(timer.elapsed_seconds, 120);
        assert_eq!(timer.elapsed_now(later + TimeDelta::minutes(30)), 120);
    }

    #[test]
    fn test_clock_skew_is_clamped() {
        let now = Utc::now();
        let mut timer = timer(now);
        timer.elapsed_seconds = 60;
        timer.start(now);

        // A clock that jumped backwards must not shrink elapsed time
        assert_eq!(timer.elapsed_now(now - TimeDelta::seconds(30)), 60);
    }

    #[test]
    fn test_advance_half_resets_elapsed() {
        let now = Utc::now();
        let mut timer = timer(now);
        timer.start(now);

        let later = now + TimeDelta::minutes(25);
        timer.advance_half(later);

        assert_eq!(timer.current_half, Half::Second);
        assert_eq!(timer.elapsed_seconds, 0);
        assert!(!timer.is_running);
    }

    #[test]
    fn test_half_serializes_as_number() {
        let json = serde_json::to_string(&Half::Second).unwrap();
        assert_eq!(json, "2");

        let parsed: Half = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Half::First);

        assert!(serde_json::from_str::<Half>("3").is_err());
    }
}
