//! Field-of-view geometry for photo markers.
//!
//! Pure functions: a marker's position, facing direction and aperture go in,
//! polygon vertices (in degrees) come out. Inputs are not validated; callers
//! pass a positive distance and an aperture in `(0, 360)`.

use foundation::math::{Direction, GeoPoint, destination_point};
use serde::{Deserialize, Serialize};

use crate::controller::PhotoMarkerState;

pub const DEFAULT_APERTURE_DEG: f64 = 60.0;
pub const DEFAULT_VIEW_DISTANCE_M: f64 = 80.0;
pub const DEFAULT_ARC_RESOLUTION: usize = 20;
pub const DEFAULT_ARROW_LENGTH_M: f64 = 30.0;
pub const DEFAULT_ARROW_WIDTH_M: f64 = 10.0;

/// Camera viewing wedge used to draw the cone.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FovParameters {
    pub aperture_deg: f64,
    pub view_distance_m: f64,
}

impl FovParameters {
    pub const fn new(aperture_deg: f64, view_distance_m: f64) -> Self {
        Self {
            aperture_deg,
            view_distance_m,
        }
    }
}

/// Typical smartphone main camera.
pub const UNKNOWN_LENS_FOV: FovParameters = FovParameters::new(65.0, 80.0);

/// One row of the focal-length lookup: applies to lenses up to `max_focal_length_mm`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FovBand {
    pub max_focal_length_mm: f64,
    pub fov: FovParameters,
}

/// Coarse focal length → FOV heuristic.
///
/// Bands are kept in ascending `max_focal_length_mm` order; lenses longer
/// than every band get `telephoto`, and a missing focal length gets `unknown`.
/// This is a display heuristic, not an optical model (sensor size is ignored).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FovTable {
    pub bands: Vec<FovBand>,
    pub telephoto: FovParameters,
    pub unknown: FovParameters,
}

impl Default for FovTable {
    fn default() -> Self {
        let band = |max_focal_length_mm, aperture_deg, view_distance_m| FovBand {
            max_focal_length_mm,
            fov: FovParameters::new(aperture_deg, view_distance_m),
        };
        Self {
            bands: vec![
                band(24.0, 84.0, 100.0),
                band(35.0, 63.0, 80.0),
                band(50.0, 47.0, 60.0),
                band(85.0, 28.0, 50.0),
            ],
            telephoto: FovParameters::new(18.0, 40.0),
            unknown: UNKNOWN_LENS_FOV,
        }
    }
}

impl FovTable {
    /// Puts `bands` in ascending order. Tables built in code or read from
    /// config must go through this once before [`lookup`](Self::lookup).
    pub fn sort_bands(&mut self) {
        self.bands
            .sort_by(|a, b| a.max_focal_length_mm.total_cmp(&b.max_focal_length_mm));
    }

    /// Expects `bands` already sorted (see [`sort_bands`](Self::sort_bands)).
    pub fn lookup(&self, focal_length_mm: Option<f64>) -> FovParameters {
        let Some(focal) = focal_length_mm else {
            return self.unknown;
        };
        self.bands
            .iter()
            .find(|b| focal <= b.max_focal_length_mm)
            .map(|b| b.fov)
            .unwrap_or(self.telephoto)
    }
}

/// FOV for a focal length using the built-in table.
pub fn default_fov_parameters(focal_length_mm: Option<f64>) -> FovParameters {
    FovTable::default().lookup(focal_length_mm)
}

/// Cone shape knobs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConeParams {
    pub aperture_deg: f64,
    pub distance_m: f64,
    pub arc_resolution: usize,
}

impl Default for ConeParams {
    fn default() -> Self {
        Self {
            aperture_deg: DEFAULT_APERTURE_DEG,
            distance_m: DEFAULT_VIEW_DISTANCE_M,
            arc_resolution: DEFAULT_ARC_RESOLUTION,
        }
    }
}

impl From<FovParameters> for ConeParams {
    fn from(fov: FovParameters) -> Self {
        Self {
            aperture_deg: fov.aperture_deg,
            distance_m: fov.view_distance_m,
            ..Self::default()
        }
    }
}

/// Closed wedge polygon: origin, `arc_resolution` arc points swept clockwise
/// from `direction - aperture/2` to `direction + aperture/2`, origin again.
///
/// Always `arc_resolution + 2` vertices; first and last are `origin`.
pub fn fov_cone_polygon(origin: GeoPoint, direction_deg: f64, params: ConeParams) -> Vec<GeoPoint> {
    let n = params.arc_resolution;
    let start = direction_deg - params.aperture_deg / 2.0;
    let step = if n > 1 {
        params.aperture_deg / (n - 1) as f64
    } else {
        0.0
    };

    let mut out = Vec::with_capacity(n + 2);
    out.push(origin);
    for i in 0..n {
        let bearing = if n == 1 {
            direction_deg
        } else {
            start + step * i as f64
        };
        out.push(destination_point(origin, bearing, params.distance_m));
    }
    out.push(origin);
    out
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArrowParams {
    pub length_m: f64,
    pub width_m: f64,
}

impl Default for ArrowParams {
    fn default() -> Self {
        Self {
            length_m: DEFAULT_ARROW_LENGTH_M,
            width_m: DEFAULT_ARROW_WIDTH_M,
        }
    }
}

/// Closed triangle `[tip, left, right, tip]` pointing along `direction_deg`.
///
/// The base corners sit `width/2` either side of the origin, perpendicular
/// to the direction.
pub fn direction_arrow_polygon(
    origin: GeoPoint,
    direction_deg: f64,
    params: ArrowParams,
) -> [GeoPoint; 4] {
    let tip = destination_point(origin, direction_deg, params.length_m);
    let half_width = params.width_m / 2.0;
    let left = destination_point(origin, direction_deg - 90.0, half_width);
    let right = destination_point(origin, direction_deg + 90.0, half_width);
    [tip, left, right, tip]
}

/// Everything the renderer needs to draw one directional marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerGeometry {
    pub position: GeoPoint,
    pub direction: Direction,
    pub cone: Vec<GeoPoint>,
    pub arrow: [GeoPoint; 4],
}

impl MarkerGeometry {
    pub fn for_marker(state: &PhotoMarkerState) -> Self {
        let direction = state.direction.degrees();
        Self {
            position: state.position,
            direction: state.direction,
            cone: fov_cone_polygon(state.position, direction, state.fov.into()),
            arrow: direction_arrow_polygon(state.position, direction, ArrowParams::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ArrowParams, ConeParams, FovParameters, FovTable, default_fov_parameters,
        direction_arrow_polygon, fov_cone_polygon,
    };
    use foundation::math::{GeoPoint, haversine_distance, initial_bearing};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn cone_has_resolution_plus_two_vertices_and_closes_on_origin() {
        let origin = GeoPoint::new(37.5, 127.0);
        for arc_resolution in [1, 2, 5, 20, 64] {
            for direction in [0.0, 90.0, 359.0, -45.0, 725.0] {
                let params = ConeParams {
                    arc_resolution,
                    ..ConeParams::default()
                };
                let cone = fov_cone_polygon(origin, direction, params);
                assert_eq!(cone.len(), arc_resolution + 2);
                assert_eq!(cone[0], origin);
                assert_eq!(cone[cone.len() - 1], origin);
            }
        }
    }

    #[test]
    fn cone_arc_spans_the_aperture() {
        let origin = GeoPoint::new(37.5, 127.0);
        let cone = fov_cone_polygon(origin, 90.0, ConeParams::default());
        let first_arc = cone[1];
        let last_arc = cone[cone.len() - 2];

        assert_close(initial_bearing(origin, first_arc), 60.0, 1e-6);
        assert_close(initial_bearing(origin, last_arc), 120.0, 1e-6);
        for p in &cone[1..cone.len() - 1] {
            assert_close(haversine_distance(origin, *p), 80.0, 1e-6);
        }
    }

    #[test]
    fn single_point_arc_lies_on_direction() {
        let origin = GeoPoint::new(10.0, 20.0);
        let params = ConeParams {
            arc_resolution: 1,
            ..ConeParams::default()
        };
        let cone = fov_cone_polygon(origin, 45.0, params);
        assert_close(initial_bearing(origin, cone[1]), 45.0, 1e-6);
    }

    #[test]
    fn arrow_is_closed_triangle_pointing_along_direction() {
        let origin = GeoPoint::new(37.5, 127.0);
        let arrow = direction_arrow_polygon(origin, 30.0, ArrowParams::default());
        assert_eq!(arrow[0], arrow[3]);
        assert_close(initial_bearing(origin, arrow[0]), 30.0, 1e-6);
        assert_close(haversine_distance(origin, arrow[0]), 30.0, 1e-6);
        assert_close(initial_bearing(origin, arrow[1]), 300.0, 1e-6);
        assert_close(initial_bearing(origin, arrow[2]), 120.0, 1e-6);
        assert_close(haversine_distance(arrow[1], arrow[2]), 10.0, 1e-6);
    }

    #[test]
    fn focal_length_table() {
        let cases = [
            (Some(13.0), (84.0, 100.0)),
            (Some(24.0), (84.0, 100.0)),
            (Some(26.0), (63.0, 80.0)),
            (Some(35.0), (63.0, 80.0)),
            (Some(50.0), (47.0, 60.0)),
            (Some(70.0), (28.0, 50.0)),
            (Some(85.0), (28.0, 50.0)),
            (Some(200.0), (18.0, 40.0)),
            (None, (65.0, 80.0)),
        ];
        for (focal, (aperture, distance)) in cases {
            assert_eq!(
                default_fov_parameters(focal),
                FovParameters::new(aperture, distance),
                "focal {focal:?}"
            );
        }
    }

    #[test]
    fn sorting_restores_band_order() {
        let mut table = FovTable::default();
        table.bands.reverse();
        table.sort_bands();
        assert_eq!(table, FovTable::default());
        assert_eq!(table.lookup(Some(30.0)), FovParameters::new(63.0, 80.0));
    }
}
