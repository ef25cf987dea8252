use foundation::ids::OwnerId;
use foundation::math::{Direction, GeoPoint};

use crate::error::ReviewError;
use crate::metadata::ExtractedMetadata;
use crate::record::UploadRequest;
use crate::validation::FileHandle;

/// The upload under review. Lives from file selection until success or cancel.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub file: FileHandle,
    pub metadata: ExtractedMetadata,
    /// `None` until GPS or a map click places the photo.
    pub location: Option<GeoPoint>,
    pub direction: Direction,
    pub owner_id: OwnerId,
}

impl PendingUpload {
    pub fn new(file: FileHandle, owner_id: OwnerId) -> Self {
        Self {
            file,
            metadata: ExtractedMetadata::default(),
            location: None,
            direction: Direction::NORTH,
            owner_id,
        }
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// Builds the persistence call, merging the reviewed direction into the
    /// metadata payload.
    pub fn upload_request(&self) -> Result<UploadRequest, ReviewError> {
        let location = self.location.ok_or(ReviewError::LocationRequired)?;
        let metadata = self.metadata.with_direction(self.direction);
        Ok(UploadRequest {
            file: self.file.clone(),
            owner_id: self.owner_id.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            metadata_json: serde_json::to_string(&metadata)?,
        })
    }
}
