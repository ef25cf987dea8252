use foundation::math::{Direction, GeoPoint};
use serde::{Deserialize, Serialize};

/// GPS block as reported by the EXIF extractor.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsInfo {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "hasGPS")]
    pub has_gps: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionInfo {
    pub degrees: f64,
    pub has_direction: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    #[serde(default)]
    pub focal_length: Option<f64>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Extractor output. Every block is optional; a failed extraction is the
/// same as `ExtractedMetadata::default()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    #[serde(default)]
    pub gps: Option<GpsInfo>,
    #[serde(default)]
    pub direction: Option<DirectionInfo>,
    #[serde(default)]
    pub camera: Option<CameraInfo>,
}

impl ExtractedMetadata {
    /// GPS position, if present, flagged valid and within range.
    pub fn gps_position(&self) -> Option<GeoPoint> {
        let gps = self.gps.filter(|g| g.has_gps)?;
        GeoPoint::validated(gps.latitude, gps.longitude).ok()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
            .filter(|d| d.has_direction && d.degrees.is_finite())
            .map(|d| Direction::new(d.degrees))
    }

    pub fn focal_length_mm(&self) -> Option<f64> {
        self.camera
            .as_ref()
            .and_then(|c| c.focal_length)
            .filter(|f| f.is_finite() && *f > 0.0)
    }

    /// Copy of the metadata with the user-chosen `direction` merged in,
    /// which is what gets persisted alongside the photo.
    pub fn with_direction(&self, direction: Direction) -> Self {
        Self {
            direction: Some(DirectionInfo {
                degrees: direction.degrees(),
                has_direction: true,
            }),
            ..self.clone()
        }
    }
}
