use foundation::ids::{OwnerId, PhotoId};
use foundation::math::{Direction, GeoPoint};
use markers::{FovTable, MarkerEdit, MarkerEvent, PermanentMarker};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metadata::ExtractedMetadata;
use crate::validation::FileHandle;

/// Canonical photo as returned by persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: PhotoId,
    #[serde(default)]
    pub user_id: Option<OwnerId>,
    #[serde(default)]
    pub filename: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub upload_date: String,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PhotoRecord {
    /// Metadata parsed into the extractor shape; unparseable metadata reads as empty.
    pub fn extracted_metadata(&self) -> ExtractedMetadata {
        self.metadata
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.extracted_metadata().direction()
    }

    /// Permanent marker for this record. Records without an owner are grouped
    /// under `fallback_owner`; a missing direction faces north.
    pub fn to_marker(&self, fallback_owner: &OwnerId, fov_table: &FovTable) -> PermanentMarker {
        self.to_marker_with(fallback_owner, &ExtractedMetadata::default(), fov_table)
    }

    /// Like [`to_marker`](Self::to_marker), but direction and focal length the
    /// record does not carry are taken from `fallback`, e.g. what the user
    /// reviewed before uploading.
    pub fn to_marker_with(
        &self,
        fallback_owner: &OwnerId,
        fallback: &ExtractedMetadata,
        fov_table: &FovTable,
    ) -> PermanentMarker {
        let metadata = self.extracted_metadata();
        let direction = metadata
            .direction()
            .or_else(|| fallback.direction())
            .unwrap_or(Direction::NORTH);
        let focal_length = metadata
            .focal_length_mm()
            .or_else(|| fallback.focal_length_mm());
        PermanentMarker {
            id: self.id.clone(),
            owner: self.user_id.clone().unwrap_or_else(|| fallback_owner.clone()),
            position: self.location,
            direction,
            fov: fov_table.lookup(focal_length),
        }
    }
}

/// Arguments of one persistence call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub file: FileHandle,
    pub owner_id: OwnerId,
    pub latitude: f64,
    pub longitude: f64,
    /// Extracted metadata with the reviewed direction merged in, as JSON text.
    pub metadata_json: String,
}

/// Write-back of an edited permanent marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerUpdate {
    Location {
        photo: PhotoId,
        owner: OwnerId,
        latitude: f64,
        longitude: f64,
    },
    Direction {
        photo: PhotoId,
        owner: OwnerId,
        degrees: f64,
    },
}

impl MarkerUpdate {
    pub fn photo(&self) -> &PhotoId {
        match self {
            Self::Location { photo, .. } | Self::Direction { photo, .. } => photo,
        }
    }
}

impl From<MarkerEdit> for MarkerUpdate {
    fn from(edit: MarkerEdit) -> Self {
        match edit.event {
            MarkerEvent::LocationChanged { position, .. } => Self::Location {
                photo: edit.photo,
                owner: edit.owner,
                latitude: position.latitude,
                longitude: position.longitude,
            },
            MarkerEvent::DirectionChanged { direction, .. } => Self::Direction {
                photo: edit.photo,
                owner: edit.owner,
                degrees: direction.degrees(),
            },
        }
    }
}
