use foundation::math::{FULL_TURN_DEG, GeoPoint};
use serde::{Deserialize, Serialize};

/// What the current drag does to its marker.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum GestureMode {
    #[default]
    Idle,
    /// Position follows the pointer; direction is untouched.
    Moving,
    /// Direction follows vertical pointer travel; position is pinned.
    Rotating,
}

/// Vertical pointer travel needed for one full clockwise turn.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RotationSensitivity {
    pixels_per_turn: f64,
}

impl RotationSensitivity {
    pub const DEFAULT_PIXELS_PER_TURN: f64 = 200.0;

    /// `pixels_per_turn` must be positive.
    pub const fn new(pixels_per_turn: f64) -> Self {
        Self { pixels_per_turn }
    }

    pub fn pixels_per_turn(self) -> f64 {
        self.pixels_per_turn
    }

    /// Unbounded rotation (degrees) for a pointer travel of `delta_px`.
    pub fn degrees_for(self, delta_px: f64) -> f64 {
        delta_px / self.pixels_per_turn * FULL_TURN_DEG
    }
}

impl Default for RotationSensitivity {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PIXELS_PER_TURN)
    }
}

/// State of one in-progress drag; exists only between start and end.
///
/// Everything is captured at gesture start and never re-read mid-gesture, so
/// a map re-center or a modifier change during the drag cannot shift the
/// anchor or flip the mode.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GestureSession {
    pub mode: GestureMode,
    pub anchor_screen_y: f64,
    /// Direction (degrees) at gesture start; rotation deltas are added to this.
    pub anchor_direction: f64,
    /// Position at gesture start; a rotating marker is pinned here.
    pub origin_position: GeoPoint,
}

impl GestureSession {
    pub fn moving(screen_y: f64, direction_deg: f64, position: GeoPoint) -> Self {
        Self {
            mode: GestureMode::Moving,
            anchor_screen_y: screen_y,
            anchor_direction: direction_deg,
            origin_position: position,
        }
    }

    pub fn rotating(screen_y: f64, direction_deg: f64, position: GeoPoint) -> Self {
        Self {
            mode: GestureMode::Rotating,
            ..Self::moving(screen_y, direction_deg, position)
        }
    }

    /// Raw (not normalized) direction for the pointer at `screen_y`.
    ///
    /// Pointer travel upwards (smaller y) rotates clockwise.
    pub fn raw_direction_at(&self, screen_y: f64, sensitivity: RotationSensitivity) -> f64 {
        let delta_y = self.anchor_screen_y - screen_y;
        self.anchor_direction + sensitivity.degrees_for(delta_y)
    }
}
