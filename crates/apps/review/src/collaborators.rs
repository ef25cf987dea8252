//! Async seams to the metadata extractor and photo persistence, plus
//! in-memory implementations for scripted sessions and tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use foundation::ids::PhotoId;
use foundation::math::{Direction, GeoPoint};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use upload::{
    ExtractedMetadata, ExtractionError, FileHandle, MarkerUpdate, PhotoRecord,
    UploadError, UploadRequest,
};
use uuid::Uuid;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reads EXIF-like metadata from a selected file.
///
/// A failure means "no metadata", never a failed review.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, file: FileHandle) -> BoxFuture<'_, Result<ExtractedMetadata, ExtractionError>>;
}

/// Photo persistence.
pub trait PhotoUploader: Send + Sync {
    fn upload(&self, request: UploadRequest) -> BoxFuture<'_, Result<PhotoRecord, UploadError>>;

    /// Writes back a moved or re-oriented permanent marker.
    fn update_marker(&self, update: MarkerUpdate) -> BoxFuture<'_, Result<(), UploadError>>;
}

/// Extractor answering from a table keyed by file blob.
#[derive(Debug, Default)]
pub struct ScriptedExtractor {
    by_blob: HashMap<u64, ExtractedMetadata>,
    delay: Duration,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, blob: u64, metadata: ExtractedMetadata) -> Self {
        self.by_blob.insert(blob, metadata);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl MetadataExtractor for ScriptedExtractor {
    fn extract(&self, file: FileHandle) -> BoxFuture<'_, Result<ExtractedMetadata, ExtractionError>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.by_blob
                .get(&file.blob)
                .cloned()
                .ok_or_else(|| ExtractionError(format!("no readable metadata in {}", file.name)))
        })
    }
}

/// Uploader keeping records in memory, with scriptable failures and latency.
#[derive(Debug, Default)]
pub struct InMemoryUploader {
    records: Mutex<BTreeMap<PhotoId, PhotoRecord>>,
    failures: Mutex<VecDeque<UploadError>>,
    requests: Mutex<Vec<UploadRequest>>,
    delay: Mutex<Duration>,
}

impl InMemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next upload fail with `error`.
    pub fn fail_next(&self, error: UploadError) {
        self.failures.lock().push_back(error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Every upload request received, in order.
    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().clone()
    }

    pub fn records(&self) -> Vec<PhotoRecord> {
        self.records.lock().values().cloned().collect()
    }

    pub fn record(&self, id: &PhotoId) -> Option<PhotoRecord> {
        self.records.lock().get(id).cloned()
    }

    fn store(&self, request: UploadRequest) -> Result<PhotoRecord, UploadError> {
        let metadata: Value = serde_json::from_str(&request.metadata_json).map_err(|err| {
            UploadError::Rejected {
                status: 400,
                message: format!("invalid metadata JSON: {err}"),
            }
        })?;
        let location = GeoPoint::validated(request.latitude, request.longitude).map_err(|err| {
            UploadError::Rejected {
                status: 400,
                message: err.to_string(),
            }
        })?;

        let id = PhotoId::new(Uuid::new_v4().to_string());
        let record = PhotoRecord {
            id: id.clone(),
            user_id: Some(request.owner_id.clone()),
            filename: format!("{id}_{}", request.file.name),
            location,
            upload_date: String::new(),
            metadata: Some(metadata),
            thumbnail_url: None,
            image_url: Some(format!("/uploads/{id}_{}", request.file.name)),
        };
        self.records.lock().insert(id, record.clone());
        Ok(record)
    }
}

impl PhotoUploader for InMemoryUploader {
    fn upload(&self, request: UploadRequest) -> BoxFuture<'_, Result<PhotoRecord, UploadError>> {
        Box::pin(async move {
            let delay = *self.delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.requests.lock().push(request.clone());
            if let Some(error) = self.failures.lock().pop_front() {
                debug!(%error, "scripted upload failure");
                return Err(error);
            }
            self.store(request)
        })
    }

    fn update_marker(&self, update: MarkerUpdate) -> BoxFuture<'_, Result<(), UploadError>> {
        Box::pin(async move {
            let mut records = self.records.lock();
            let Some(record) = records.get_mut(update.photo()) else {
                return Err(UploadError::Rejected {
                    status: 404,
                    message: format!("photo {} not found", update.photo()),
                });
            };
            match update {
                MarkerUpdate::Location {
                    latitude,
                    longitude,
                    ..
                } => {
                    record.location = GeoPoint::validated(latitude, longitude).map_err(|err| {
                        UploadError::Rejected {
                            status: 400,
                            message: err.to_string(),
                        }
                    })?;
                }
                MarkerUpdate::Direction { degrees, .. } => {
                    let metadata = record
                        .extracted_metadata()
                        .with_direction(Direction::new(degrees));
                    record.metadata = serde_json::to_value(metadata).ok();
                }
            }
            Ok(())
        })
    }
}
