//! Scripted review sessions: a JSON description of files, existing photos
//! and user input, replayed against in-memory collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use foundation::ids::{OwnerId, PhotoId};
use foundation::math::{GeoPoint, ScreenPoint};
use markers::{LocalViewport, MarkerId, ModifierKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use upload::{ConfigError, ExtractedMetadata, FileHandle, PhotoRecord, ReviewConfig, UploadError};

use crate::collaborators::{InMemoryUploader, ScriptedExtractor};
use crate::driver::ReviewDriver;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("step {step}: no file with blob {blob}")]
    UnknownFile { step: usize, blob: u64 },

    #[error("step {step}: unknown modifier key {key:?}")]
    UnknownKey { step: usize, key: String },

    #[error("step {step}: nothing has been uploaded yet")]
    NoUpload { step: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    pub blob: u64,
    pub name: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// `None` makes extraction fail for this file.
    #[serde(default)]
    pub metadata: Option<ExtractedMetadata>,
}

impl ScenarioFile {
    fn handle(&self) -> FileHandle {
        FileHandle {
            blob: self.blob,
            name: self.name.clone(),
            size_bytes: self.size_bytes,
            mime_type: self.mime_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerRef {
    #[default]
    Preview,
    /// The photo most recently published in this session.
    LastUpload,
    Photo(PhotoId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    SelectFile {
        blob: u64,
    },
    /// Wait for every outstanding extraction, upload and write-back.
    Settle,
    Click {
        x: f64,
        y: f64,
    },
    KeyDown {
        key: String,
    },
    KeyUp {
        key: String,
    },
    Blur,
    PointerDown {
        #[serde(default)]
        marker: MarkerRef,
        x: f64,
        y: f64,
    },
    PointerMove {
        #[serde(default)]
        marker: MarkerRef,
        x: f64,
        y: f64,
    },
    PointerUp {
        #[serde(default)]
        marker: MarkerRef,
    },
    Confirm,
    Retry,
    Cancel,
    UploadAnother,
    FailNextUpload {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub owner: OwnerId,
    #[serde(default)]
    pub files: Vec<ScenarioFile>,
    /// Photos already on the map when the session starts.
    #[serde(default)]
    pub existing: Vec<PhotoRecord>,
    #[serde(default = "default_meters_per_pixel")]
    pub meters_per_pixel: f64,
    pub steps: Vec<Step>,
}

fn default_meters_per_pixel() -> f64 {
    1.0
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ScenarioError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub step: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingSummary {
    pub file: String,
    pub location: Option<GeoPoint>,
    pub direction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSummary {
    pub id: PhotoId,
    pub owner: OwnerId,
    pub position: GeoPoint,
    pub direction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub state: String,
    pub pending: Option<PendingSummary>,
    /// Permanent markers, grouped by owner.
    pub markers: Vec<MarkerSummary>,
    pub uploaded: Vec<PhotoRecord>,
    pub last_error: Option<String>,
    pub rejections: Vec<Rejection>,
    pub map_center: GeoPoint,
    pub effects: usize,
}

fn modifier(step: usize, key: &str) -> Result<ModifierKey, ScenarioError> {
    ModifierKey::from_key_name(key).ok_or_else(|| ScenarioError::UnknownKey {
        step,
        key: key.to_string(),
    })
}

fn resolve(
    step: usize,
    marker: &MarkerRef,
    driver: &ReviewDriver<LocalViewport>,
) -> Result<MarkerId, ScenarioError> {
    match marker {
        MarkerRef::Preview => Ok(MarkerId::Preview),
        MarkerRef::Photo(id) => Ok(MarkerId::Photo(id.clone())),
        MarkerRef::LastUpload => driver
            .orchestrator()
            .last_record()
            .map(|r| MarkerId::Photo(r.id.clone()))
            .ok_or(ScenarioError::NoUpload { step }),
    }
}

/// Replays `scenario`. Actions the review refuses are collected as
/// rejections; malformed steps abort the run.
pub async fn run_scenario(
    scenario: &Scenario,
    config: ReviewConfig,
) -> Result<ScenarioReport, ScenarioError> {
    let extractor = scenario
        .files
        .iter()
        .filter_map(|f| f.metadata.clone().map(|m| (f.blob, m)))
        .fold(ScriptedExtractor::new(), |ex, (blob, md)| {
            ex.with_metadata(blob, md)
        });
    let uploader = Arc::new(InMemoryUploader::new());
    let host = LocalViewport::new(
        config.map_center,
        scenario.meters_per_pixel,
        ScreenPoint::new(800.0, 600.0),
    );
    let mut driver = ReviewDriver::new(config, Arc::new(extractor), uploader.clone(), host);
    driver
        .orchestrator_mut()
        .show_records(&scenario.existing, &scenario.owner);

    let mut rejections = Vec::new();
    for (index, step) in scenario.steps.iter().enumerate() {
        debug!(index, ?step, "scenario step");
        let outcome = match step {
            Step::SelectFile { blob } => {
                let file = scenario
                    .files
                    .iter()
                    .find(|f| f.blob == *blob)
                    .ok_or(ScenarioError::UnknownFile {
                        step: index,
                        blob: *blob,
                    })?;
                driver
                    .select_file(file.handle(), scenario.owner.clone())
                    .map(drop)
            }
            Step::Settle => {
                driver.settle().await;
                Ok(())
            }
            Step::Click { x, y } => {
                driver.click(ScreenPoint::new(*x, *y));
                Ok(())
            }
            Step::KeyDown { key } => {
                driver.key_down(modifier(index, key)?);
                Ok(())
            }
            Step::KeyUp { key } => {
                driver.key_up(modifier(index, key)?);
                Ok(())
            }
            Step::Blur => {
                driver.blur();
                Ok(())
            }
            Step::PointerDown { marker, x, y } => {
                let target = resolve(index, marker, &driver)?;
                driver.pointer_down(&target, ScreenPoint::new(*x, *y));
                Ok(())
            }
            Step::PointerMove { marker, x, y } => {
                let target = resolve(index, marker, &driver)?;
                driver.pointer_move(&target, ScreenPoint::new(*x, *y));
                Ok(())
            }
            Step::PointerUp { marker } => {
                let target = resolve(index, marker, &driver)?;
                driver.pointer_up(&target);
                Ok(())
            }
            Step::Confirm => driver.confirm().map(drop),
            Step::Retry => driver.retry().map(drop),
            Step::Cancel => driver.cancel(),
            Step::UploadAnother => driver.upload_another(),
            Step::FailNextUpload { message } => {
                uploader.fail_next(UploadError::Transport(message.clone()));
                Ok(())
            }
        };
        if let Err(err) = outcome {
            info!(index, %err, "action refused");
            rejections.push(Rejection {
                step: index,
                message: err.to_string(),
            });
        }
    }
    driver.settle().await;

    Ok(report(&driver, &uploader, rejections))
}

fn report(
    driver: &ReviewDriver<LocalViewport>,
    uploader: &InMemoryUploader,
    rejections: Vec<Rejection>,
) -> ScenarioReport {
    let orchestrator = driver.orchestrator();
    let layer = orchestrator.layer();
    let markers = layer
        .owners()
        .flat_map(|owner| {
            layer
                .markers_for_owner(owner)
                .into_iter()
                .filter_map(move |m| match &m.id {
                    MarkerId::Photo(id) => Some(MarkerSummary {
                        id: id.clone(),
                        owner: owner.clone(),
                        position: m.position,
                        direction: m.direction.degrees(),
                    }),
                    MarkerId::Preview => None,
                })
        })
        .collect();

    ScenarioReport {
        state: format!("{:?}", orchestrator.state()),
        pending: orchestrator.pending().map(|p| PendingSummary {
            file: p.file.name.clone(),
            location: p.location,
            direction: p.direction.degrees(),
        }),
        markers,
        uploaded: uploader.records(),
        last_error: orchestrator.last_error().map(|e| e.to_string()),
        rejections,
        map_center: driver.host().center(),
        effects: driver.history().len(),
    }
}
