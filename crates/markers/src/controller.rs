//! Directional marker controller.
//!
//! One controller owns one marker and its gesture lifecycle:
//!
//! ```text
//! Idle --start(modifier up)--> Moving   --end--> Idle  (LocationChanged)
//! Idle --start(modifier down)-> Rotating --end--> Idle (DirectionChanged)
//! ```
//!
//! The mode is chosen at gesture start and kept until gesture end; there is
//! no Moving <-> Rotating edge.

use foundation::ids::PhotoId;
use foundation::math::{Direction, GeoPoint, ScreenPoint};
use tracing::debug;

use crate::fov::{FovParameters, MarkerGeometry};
use crate::gesture::{GestureMode, GestureSession, RotationSensitivity};
use crate::host::MapHost;
use crate::input::ModifierKeyObserver;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerId {
    /// The not-yet-persisted marker of the upload under review.
    Preview,
    Photo(PhotoId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoMarkerState {
    pub id: MarkerId,
    pub position: GeoPoint,
    pub direction: Direction,
    pub fov: FovParameters,
    pub selected: bool,
    pub is_preview: bool,
}

/// Committed result of a finished gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerEvent {
    LocationChanged { id: MarkerId, position: GeoPoint },
    DirectionChanged { id: MarkerId, direction: Direction },
}

/// Live result of one pointer move; anything but `Ignored` needs a re-render.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum GestureUpdate {
    Ignored,
    Moved { position: GeoPoint },
    Rotated { direction: Direction, pinned: GeoPoint },
}

#[derive(Debug, Clone)]
pub struct MarkerController {
    state: PhotoMarkerState,
    session: Option<GestureSession>,
    sensitivity: RotationSensitivity,
}

impl MarkerController {
    pub fn new(id: MarkerId, position: GeoPoint, direction: Direction, fov: FovParameters) -> Self {
        let is_preview = id == MarkerId::Preview;
        Self {
            state: PhotoMarkerState {
                id,
                position,
                direction,
                fov,
                selected: false,
                is_preview,
            },
            session: None,
            sensitivity: RotationSensitivity::default(),
        }
    }

    pub fn preview(position: GeoPoint, direction: Direction, fov: FovParameters) -> Self {
        Self::new(MarkerId::Preview, position, direction, fov)
    }

    pub fn with_sensitivity(mut self, sensitivity: RotationSensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn state(&self) -> &PhotoMarkerState {
        &self.state
    }

    pub fn id(&self) -> &MarkerId {
        &self.state.id
    }

    pub fn position(&self) -> GeoPoint {
        self.state.position
    }

    pub fn direction(&self) -> Direction {
        self.state.direction
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn mode(&self) -> GestureMode {
        self.session.map_or(GestureMode::Idle, |s| s.mode)
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.state.selected = selected;
    }

    /// Programmatic placement. Refused (returns `false`) mid-gesture.
    pub fn set_position(&mut self, position: GeoPoint) -> bool {
        if self.session.is_some() {
            return false;
        }
        self.state.position = position;
        true
    }

    /// Programmatic re-orientation. Refused (returns `false`) mid-gesture.
    pub fn set_direction(&mut self, direction: Direction) -> bool {
        if self.session.is_some() {
            return false;
        }
        self.state.direction = direction;
        true
    }

    pub fn set_fov(&mut self, fov: FovParameters) {
        self.state.fov = fov;
    }

    /// Cone + arrow for the current state.
    pub fn geometry(&self) -> MarkerGeometry {
        MarkerGeometry::for_marker(&self.state)
    }

    /// Starts a gesture. Returns the active mode; a start while a gesture is
    /// already running is ignored and leaves that gesture's mode in place.
    pub fn on_gesture_start(&mut self, screen_y: f64, modifier_pressed: bool) -> GestureMode {
        if let Some(active) = self.session {
            return active.mode;
        }

        let direction = self.state.direction.degrees();
        let position = self.state.position;
        let session = if modifier_pressed {
            GestureSession::rotating(screen_y, direction, position)
        } else {
            GestureSession::moving(screen_y, direction, position)
        };
        debug!(marker = ?self.state.id, mode = ?session.mode, "gesture start");
        self.session = Some(session);
        session.mode
    }

    /// Starts a gesture, asking `modifiers` once for the rotate modifier.
    pub fn begin_gesture(
        &mut self,
        screen_y: f64,
        modifiers: &dyn ModifierKeyObserver,
    ) -> GestureMode {
        self.on_gesture_start(screen_y, modifiers.rotate_modifier_pressed())
    }

    /// Applies one pointer move.
    ///
    /// `current_geo` is where the host's native drag would put the marker. It
    /// is taken as-is while Moving and discarded while Rotating.
    pub fn on_gesture_move(&mut self, screen_y: f64, current_geo: GeoPoint) -> GestureUpdate {
        let Some(session) = self.session else {
            return GestureUpdate::Ignored;
        };

        match session.mode {
            GestureMode::Idle => GestureUpdate::Ignored,
            GestureMode::Moving => {
                self.state.position = current_geo;
                GestureUpdate::Moved {
                    position: current_geo,
                }
            }
            GestureMode::Rotating => {
                let raw = session.raw_direction_at(screen_y, self.sensitivity);
                self.state.direction = Direction::new(raw);
                self.state.position = session.origin_position;
                GestureUpdate::Rotated {
                    direction: self.state.direction,
                    pinned: session.origin_position,
                }
            }
        }
    }

    /// [`on_gesture_move`](Self::on_gesture_move) driven by a live host:
    /// projects the pointer through the host and, while Rotating, tells the
    /// host to keep the marker where it was.
    pub fn drive_move(&mut self, host: &mut dyn MapHost, pointer: ScreenPoint) -> GestureUpdate {
        let current_geo = host.screen_point_to_geo(pointer);
        let update = self.on_gesture_move(pointer.y, current_geo);
        if let GestureUpdate::Rotated { pinned, .. } = update {
            host.suppress_native_position(&self.state.id, pinned);
        }
        update
    }

    /// Ends the gesture and reports what it committed. `None` when idle.
    pub fn on_gesture_end(&mut self) -> Option<MarkerEvent> {
        let session = self.session.take()?;
        let id = self.state.id.clone();

        let event = match session.mode {
            GestureMode::Idle => return None,
            GestureMode::Moving => MarkerEvent::LocationChanged {
                id,
                position: self.state.position,
            },
            GestureMode::Rotating => {
                self.state.position = session.origin_position;
                MarkerEvent::DirectionChanged {
                    id,
                    direction: self.state.direction,
                }
            }
        };
        debug!(marker = ?self.state.id, ?event, "gesture end");
        Some(event)
    }

    /// [`on_gesture_end`](Self::on_gesture_end) plus a final host pin for
    /// rotations, so the native drag's last frame cannot leak through.
    pub fn finish_gesture(&mut self, host: &mut dyn MapHost) -> Option<MarkerEvent> {
        let event = self.on_gesture_end()?;
        if matches!(event, MarkerEvent::DirectionChanged { .. }) {
            host.suppress_native_position(&self.state.id, self.state.position);
        }
        Some(event)
    }
}
