//! Seams to the map library hosting the markers.

use std::collections::BTreeMap;

use foundation::math::{EARTH_MEAN_RADIUS_M, GeoPoint, ScreenPoint, wrap_longitude};

use crate::controller::MarkerId;

/// What the marker engine needs from the map.
pub trait MapHost {
    /// Live pointer → geo projection (drives Moving gestures).
    fn screen_point_to_geo(&self, point: ScreenPoint) -> GeoPoint;

    fn geo_to_screen_point(&self, point: GeoPoint) -> ScreenPoint;

    /// Overrides the host's native drag for `marker`, keeping it drawn at
    /// `position` (used while Rotating).
    fn suppress_native_position(&mut self, marker: &MarkerId, position: GeoPoint);

    fn center_on(&mut self, point: GeoPoint);
}

/// Flat local viewport: equirectangular projection around `center`.
///
/// Accurate enough at city zoom levels, and deterministic, which makes it the
/// host of choice for scripted sessions and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalViewport {
    center: GeoPoint,
    meters_per_pixel: f64,
    size_px: ScreenPoint,
    pinned: BTreeMap<MarkerId, GeoPoint>,
}

impl LocalViewport {
    pub fn new(center: GeoPoint, meters_per_pixel: f64, size_px: ScreenPoint) -> Self {
        Self {
            center,
            meters_per_pixel: meters_per_pixel.max(f64::MIN_POSITIVE),
            size_px,
            pinned: BTreeMap::new(),
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    /// Last position the host was told to keep `marker` at, if any.
    pub fn pinned_position(&self, marker: &MarkerId) -> Option<GeoPoint> {
        self.pinned.get(marker).copied()
    }

    fn meters_per_degree_lon(&self) -> f64 {
        self.meters_per_degree_lat() * self.center.latitude.to_radians().cos()
    }

    fn meters_per_degree_lat(&self) -> f64 {
        EARTH_MEAN_RADIUS_M * std::f64::consts::PI / 180.0
    }
}

impl MapHost for LocalViewport {
    fn screen_point_to_geo(&self, point: ScreenPoint) -> GeoPoint {
        let offset = point - ScreenPoint::new(self.size_px.x / 2.0, self.size_px.y / 2.0);
        let east_m = offset.x * self.meters_per_pixel;
        let north_m = -offset.y * self.meters_per_pixel;
        GeoPoint::new(
            self.center.latitude + north_m / self.meters_per_degree_lat(),
            wrap_longitude(self.center.longitude + east_m / self.meters_per_degree_lon()),
        )
    }

    fn geo_to_screen_point(&self, point: GeoPoint) -> ScreenPoint {
        let north_m = (point.latitude - self.center.latitude) * self.meters_per_degree_lat();
        let east_m = wrap_longitude(point.longitude - self.center.longitude)
            * self.meters_per_degree_lon();
        ScreenPoint::new(
            self.size_px.x / 2.0 + east_m / self.meters_per_pixel,
            self.size_px.y / 2.0 - north_m / self.meters_per_pixel,
        )
    }

    fn suppress_native_position(&mut self, marker: &MarkerId, position: GeoPoint) {
        self.pinned.insert(marker.clone(), position);
    }

    fn center_on(&mut self, point: GeoPoint) {
        self.center = point;
    }
}
