//! Spherical-Earth geodesy for city-scale marker placement.
//!
//! Everything here works on a sphere of mean radius [`EARTH_MEAN_RADIUS_M`].
//! The error against WGS84 is well under a metre at the distances markers
//! use (tens to hundreds of metres), which is what the map renders anyway.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius (meters).
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_000.0;

/// Geographic position in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("invalid latitude: {0}")]
    Latitude(f64),
    #[error("invalid longitude: {0}")]
    Longitude(f64),
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds a point, rejecting coordinates outside `[-90,90] x [-180,180]`.
    pub fn validated(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }
        Ok(Self::new(latitude, longitude))
    }

    pub fn validate(self) -> Result<Self, CoordinateError> {
        Self::validated(self.latitude, self.longitude)
    }
}

/// Wraps a longitude into `[-180, 180)`.
pub fn wrap_longitude(lon_deg: f64) -> f64 {
    (lon_deg + 540.0).rem_euclid(360.0) - 180.0
}

/// Point reached by travelling `distance_m` from `origin` along the initial
/// great-circle bearing `bearing_deg` (0 = north, clockwise).
///
/// Degenerate near the poles; callers place markers at city scale.
pub fn destination_point(origin: GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let phi1 = origin.latitude.to_radians();
    let lambda1 = origin.longitude.to_radians();
    let theta = bearing_deg.to_radians();
    let delta = distance_m / EARTH_MEAN_RADIUS_M;

    let (sin_phi1, cos_phi1) = phi1.sin_cos();
    let (sin_delta, cos_delta) = delta.sin_cos();

    let sin_phi2 = sin_phi1 * cos_delta + cos_phi1 * sin_delta * theta.cos();
    let phi2 = sin_phi2.clamp(-1.0, 1.0).asin();
    let lambda2 = lambda1
        + (theta.sin() * sin_delta * cos_phi1).atan2(cos_delta - sin_phi1 * phi2.sin());

    GeoPoint::new(phi2.to_degrees(), wrap_longitude(lambda2.to_degrees()))
}

/// Initial great-circle bearing from `from` to `to`, in `[0, 360)`.
pub fn initial_bearing(from: GeoPoint, to: GeoPoint) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let delta_lambda = (to.longitude - from.longitude).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    super::normalize_direction(x.atan2(y).to_degrees())
}

/// Great-circle distance in meters (haversine).
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_MEAN_RADIUS_M * h.sqrt().min(1.0).asin()
}
