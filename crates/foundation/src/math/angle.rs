use serde::{Deserialize, Serialize};

/// Degrees in one full turn.
pub const FULL_TURN_DEG: f64 = 360.0;

/// Reduces any finite angle to `[0, 360)`.
pub fn normalize_direction(degrees: f64) -> f64 {
    let r = degrees % FULL_TURN_DEG;
    let r = if r < 0.0 { r + FULL_TURN_DEG } else { r };
    // A tiny negative remainder rounds up to exactly 360.0 when shifted.
    if r >= FULL_TURN_DEG { 0.0 } else { r }
}

/// Compass direction (0 = north, clockwise), always stored in `[0, 360)`.
///
/// Raw, unbounded angles (e.g. a multi-turn rotation delta) stay plain `f64`
/// until they are committed through [`Direction::new`].
#[derive(Debug, Copy, Clone, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Direction(f64);

impl Direction {
    pub const NORTH: Direction = Direction(0.0);

    pub fn new(degrees: f64) -> Self {
        Self(normalize_direction(degrees))
    }

    pub fn degrees(self) -> f64 {
        self.0
    }

    /// Adds an unbounded delta and re-normalizes.
    pub fn rotated_by(self, delta_deg: f64) -> Self {
        Self::new(self.0 + delta_deg)
    }
}

impl From<f64> for Direction {
    fn from(degrees: f64) -> Self {
        Self::new(degrees)
    }
}

impl From<Direction> for f64 {
    fn from(direction: Direction) -> Self {
        direction.0
    }
}
