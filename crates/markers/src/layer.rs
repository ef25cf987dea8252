use std::collections::{BTreeMap, BTreeSet};

use foundation::ids::{OwnerId, PhotoId};
use foundation::math::{Direction, GeoPoint, ScreenPoint, haversine_distance};
use tracing::debug;

use crate::controller::{GestureUpdate, MarkerController, MarkerEvent, MarkerId, PhotoMarkerState};
use crate::fov::{FovParameters, MarkerGeometry};
use crate::gesture::{GestureMode, RotationSensitivity};
use crate::host::MapHost;

/// A persisted photo as the map shows it.
#[derive(Debug, Clone, PartialEq)]
pub struct PermanentMarker {
    pub id: PhotoId,
    pub owner: OwnerId,
    pub position: GeoPoint,
    pub direction: Direction,
    pub fov: FovParameters,
}

/// A committed edit of a persisted photo's marker, to be written back.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerEdit {
    pub photo: PhotoId,
    pub owner: OwnerId,
    pub event: MarkerEvent,
}

#[derive(Debug, Clone)]
struct Entry {
    owner: OwnerId,
    controller: MarkerController,
}

/// Permanent markers, grouped by uploader.
///
/// Ordering contract:
/// - `owners()` and `markers_for_owner()` iterate in ascending id order.
///
/// Every marker has its own controller, so drags on different markers
/// never share gesture state.
#[derive(Debug, Default)]
pub struct PhotoLayer {
    entries: BTreeMap<PhotoId, Entry>,
    by_owner: BTreeMap<OwnerId, BTreeSet<PhotoId>>,
    selected: Option<PhotoId>,
    sensitivity: RotationSensitivity,
}

impl PhotoLayer {
    pub fn new(sensitivity: RotationSensitivity) -> Self {
        Self {
            sensitivity,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces a marker. Replacing keeps selection but drops any
    /// gesture in progress on the old marker.
    pub fn insert(&mut self, marker: PermanentMarker) {
        self.detach(&marker.id);
        let mut controller = MarkerController::new(
            MarkerId::Photo(marker.id.clone()),
            marker.position,
            marker.direction,
            marker.fov,
        )
        .with_sensitivity(self.sensitivity);
        controller.set_selected(self.selected.as_ref() == Some(&marker.id));

        self.by_owner
            .entry(marker.owner.clone())
            .or_default()
            .insert(marker.id.clone());
        self.entries.insert(
            marker.id,
            Entry {
                owner: marker.owner,
                controller,
            },
        );
    }

    pub fn remove(&mut self, id: &PhotoId) -> bool {
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        self.detach(id)
    }

    fn detach(&mut self, id: &PhotoId) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        if let Some(ids) = self.by_owner.get_mut(&entry.owner) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_owner.remove(&entry.owner);
            }
        }
        true
    }

    pub fn get(&self, id: &PhotoId) -> Option<&PhotoMarkerState> {
        self.entries.get(id).map(|e| e.controller.state())
    }

    pub fn owner_of(&self, id: &PhotoId) -> Option<&OwnerId> {
        self.entries.get(id).map(|e| &e.owner)
    }

    pub fn owners(&self) -> impl Iterator<Item = &OwnerId> + '_ {
        self.by_owner.keys()
    }

    pub fn markers_for_owner(&self, owner: &OwnerId) -> Vec<&PhotoMarkerState> {
        self.by_owner
            .get(owner)
            .into_iter()
            .flatten()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn geometries(&self) -> Vec<MarkerGeometry> {
        self.entries
            .values()
            .map(|e| e.controller.geometry())
            .collect()
    }

    /// Selects `id` (deselecting any other). Unknown ids clear the selection.
    pub fn select(&mut self, id: Option<&PhotoId>) {
        if let Some(prev) = self.selected.take() {
            if let Some(entry) = self.entries.get_mut(&prev) {
                entry.controller.set_selected(false);
            }
        }
        if let Some(id) = id {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.controller.set_selected(true);
                self.selected = Some(id.clone());
            }
        }
    }

    pub fn selected(&self) -> Option<&PhotoId> {
        self.selected.as_ref()
    }

    /// Closest marker within `max_distance_m` of `point` (ties: lowest id).
    pub fn nearest(&self, point: GeoPoint, max_distance_m: f64) -> Option<&PhotoId> {
        self.entries
            .iter()
            .map(|(id, e)| (id, haversine_distance(point, e.controller.position())))
            .filter(|(_, d)| *d <= max_distance_m)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    pub fn gesture_start(
        &mut self,
        id: &PhotoId,
        screen_y: f64,
        modifier_pressed: bool,
    ) -> GestureMode {
        self.entries.get_mut(id).map_or(GestureMode::Idle, |e| {
            e.controller.on_gesture_start(screen_y, modifier_pressed)
        })
    }

    pub fn gesture_move(
        &mut self,
        id: &PhotoId,
        host: &mut dyn MapHost,
        pointer: ScreenPoint,
    ) -> GestureUpdate {
        self.entries.get_mut(id).map_or(GestureUpdate::Ignored, |e| {
            e.controller.drive_move(host, pointer)
        })
    }

    pub fn gesture_end(&mut self, id: &PhotoId, host: &mut dyn MapHost) -> Option<MarkerEdit> {
        let entry = self.entries.get_mut(id)?;
        let event = entry.controller.finish_gesture(host)?;
        debug!(photo = %id, ?event, "permanent marker edited");
        Some(MarkerEdit {
            photo: id.clone(),
            owner: entry.owner.clone(),
            event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{MarkerEdit, PermanentMarker, PhotoLayer};
    use crate::controller::MarkerEvent;
    use crate::controller::MarkerId;
    use crate::fov::UNKNOWN_LENS_FOV;
    use crate::gesture::RotationSensitivity;
    use crate::host::{LocalViewport, MapHost};
    use foundation::ids::{OwnerId, PhotoId};
    use foundation::math::{Direction, GeoPoint, ScreenPoint, destination_point};

    fn photo(id: &str, owner: &str, position: GeoPoint) -> PermanentMarker {
        PermanentMarker {
            id: PhotoId::new(id),
            owner: OwnerId::new(owner),
            position,
            direction: Direction::NORTH,
            fov: UNKNOWN_LENS_FOV,
        }
    }

    fn layer() -> PhotoLayer {
        let base = GeoPoint::new(37.54, 127.05);
        let mut layer = PhotoLayer::new(RotationSensitivity::default());
        layer.insert(photo("b", "bob", base));
        layer.insert(photo("a", "alice", destination_point(base, 90.0, 50.0)));
        layer.insert(photo("c", "alice", destination_point(base, 0.0, 500.0)));
        layer
    }

    #[test]
    fn groups_by_owner_in_id_order() {
        let layer = layer();
        let owners: Vec<&str> = layer.owners().map(|o| o.as_str()).collect();
        assert_eq!(owners, vec!["alice", "bob"]);

        let alice: Vec<MarkerId> = layer
            .markers_for_owner(&OwnerId::new("alice"))
            .into_iter()
            .map(|m| m.id.clone())
            .collect();
        assert_eq!(
            alice,
            vec![
                MarkerId::Photo(PhotoId::new("a")),
                MarkerId::Photo(PhotoId::new("c"))
            ]
        );
        assert!(layer.markers_for_owner(&OwnerId::new("nobody")).is_empty());
    }

    #[test]
    fn remove_drops_empty_owner_group_and_selection() {
        let mut layer = layer();
        layer.select(Some(&PhotoId::new("b")));
        assert!(layer.remove(&PhotoId::new("b")));
        assert!(!layer.remove(&PhotoId::new("b")));
        assert_eq!(layer.selected(), None);
        assert_eq!(layer.owners().count(), 1);
        assert_eq!(layer.len(), 2);
    }

    #[test]
    fn selection_is_exclusive() {
        let mut layer = layer();
        layer.select(Some(&PhotoId::new("a")));
        layer.select(Some(&PhotoId::new("c")));
        assert!(!layer.get(&PhotoId::new("a")).expect("a").selected);
        assert!(layer.get(&PhotoId::new("c")).expect("c").selected);

        layer.select(Some(&PhotoId::new("missing")));
        assert_eq!(layer.selected(), None);
        assert!(!layer.get(&PhotoId::new("c")).expect("c").selected);
    }

    #[test]
    fn nearest_respects_radius() {
        let layer = layer();
        let near_a = destination_point(GeoPoint::new(37.54, 127.05), 90.0, 45.0);
        assert_eq!(layer.nearest(near_a, 20.0), Some(&PhotoId::new("a")));
        assert_eq!(layer.nearest(GeoPoint::new(0.0, 0.0), 100.0), None);
    }

    #[test]
    fn concurrent_gestures_on_different_markers_are_independent() {
        let mut layer = layer();
        let a = PhotoId::new("a");
        let b = PhotoId::new("b");
        let b_start = layer.get(&b).expect("b").position;
        let mut host = LocalViewport::new(b_start, 2.0, ScreenPoint::new(800.0, 600.0));

        layer.gesture_start(&a, 100.0, false);
        layer.gesture_start(&b, 100.0, true);

        let pointer_a = ScreenPoint::new(350.0, 80.0);
        let moved_to = host.screen_point_to_geo(pointer_a);
        layer.gesture_move(&a, &mut host, pointer_a);
        layer.gesture_move(&b, &mut host, ScreenPoint::new(500.0, 50.0));

        assert_eq!(layer.get(&a).expect("a").position, moved_to);
        assert_eq!(layer.get(&a).expect("a").direction, Direction::NORTH);
        assert_eq!(layer.get(&b).expect("b").position, b_start);
        assert_eq!(layer.get(&b).expect("b").direction.degrees(), 90.0);
        assert_eq!(host.pinned_position(&MarkerId::Photo(a.clone())), None);
        assert_eq!(host.pinned_position(&MarkerId::Photo(b.clone())), Some(b_start));

        assert_eq!(
            layer.gesture_end(&a, &mut host),
            Some(MarkerEdit {
                photo: a.clone(),
                owner: OwnerId::new("alice"),
                event: MarkerEvent::LocationChanged {
                    id: MarkerId::Photo(a.clone()),
                    position: moved_to,
                },
            })
        );
        assert!(matches!(
            layer.gesture_end(&b, &mut host).map(|e| e.event),
            Some(MarkerEvent::DirectionChanged { .. })
        ));
        assert_eq!(layer.gesture_end(&b, &mut host), None);
    }

    #[test]
    fn reinsert_moves_owner_group() {
        let mut layer = layer();
        let mut moved = photo("b", "alice", GeoPoint::new(1.0, 1.0));
        moved.direction = Direction::new(10.0);
        layer.insert(moved);
        assert_eq!(layer.owners().count(), 1);
        assert_eq!(layer.markers_for_owner(&OwnerId::new("alice")).len(), 3);
        assert_eq!(layer.owner_of(&PhotoId::new("b")), Some(&OwnerId::new("alice")));
        assert_eq!(layer.geometries().len(), 3);
    }
}
