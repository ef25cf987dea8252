//! Upload review state machine.
//!
//! ```text
//! Idle --select_file--> FileSelected --metadata_extracted--> Reviewing
//! Reviewing --confirm (location set)--> Uploading
//! Uploading --ok--> Success      Uploading --err--> Error --retry--> Uploading
//! Success | Error --upload_another | cancel--> Idle
//! FileSelected | Reviewing | Uploading --cancel--> Idle
//! ```
//!
//! The orchestrator performs no I/O. Every side effect is queued as a
//! [`ReviewEffect`] for the host to carry out; async completions come back
//! tagged with the [`Generation`] that requested them, and completions from
//! an older generation are dropped.

use foundation::ids::{OwnerId, PhotoId};
use foundation::math::{Direction, GeoPoint, ScreenPoint};
use markers::{
    GestureMode, GestureUpdate, MapHost, MarkerController, MarkerEvent, MarkerGeometry, MarkerId,
    ModifierKeyObserver, PhotoLayer, PhotoMarkerState,
};
use runtime::{EventBus, Generation, GenerationCounter};
use tracing::{debug, info, warn};

use crate::config::ReviewConfig;
use crate::error::{ExtractionError, ReviewError, UploadError};
use crate::metadata::ExtractedMetadata;
use crate::pending::PendingUpload;
use crate::record::{MarkerUpdate, PhotoRecord, UploadRequest};
use crate::validation::{FileHandle, validate_file};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ReviewState {
    #[default]
    Idle,
    /// Waiting for metadata extraction.
    FileSelected,
    Reviewing,
    Uploading,
    Success,
    Error,
}

/// Work the host must perform on the orchestrator's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEffect {
    StateChanged {
        from: ReviewState,
        to: ReviewState,
    },
    /// Run the metadata extractor; report back with `metadata_extracted`.
    ExtractMetadata {
        generation: Generation,
        file: FileHandle,
    },
    CenterMap {
        point: GeoPoint,
    },
    /// Redraw the preview marker.
    PreviewUpdated {
        marker: PhotoMarkerState,
        geometry: MarkerGeometry,
    },
    PreviewRemoved,
    /// Call persistence; report back with `upload_finished`.
    Upload {
        generation: Generation,
        request: UploadRequest,
    },
    UploadFailed {
        error: UploadError,
    },
    Published {
        record: PhotoRecord,
    },
    /// Write back an edited permanent marker.
    UpdateMarker {
        update: MarkerUpdate,
    },
    OpenFilePicker,
}

pub struct UploadOrchestrator {
    config: ReviewConfig,
    state: ReviewState,
    generations: GenerationCounter,
    pending: Option<PendingUpload>,
    preview: Option<MarkerController>,
    /// Request of the current or last upload attempt; `retry` resends it.
    in_flight: Option<UploadRequest>,
    layer: PhotoLayer,
    effects: EventBus<ReviewEffect>,
    last_error: Option<UploadError>,
    last_record: Option<PhotoRecord>,
}

impl UploadOrchestrator {
    pub fn new(config: ReviewConfig) -> Self {
        let layer = PhotoLayer::new(config.rotation_sensitivity);
        Self {
            config,
            state: ReviewState::Idle,
            generations: GenerationCounter::new(),
            pending: None,
            preview: None,
            in_flight: None,
            layer,
            effects: EventBus::new(),
            last_error: None,
            last_record: None,
        }
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn pending(&self) -> Option<&PendingUpload> {
        self.pending.as_ref()
    }

    pub fn preview(&self) -> Option<&PhotoMarkerState> {
        self.preview.as_ref().map(|p| p.state())
    }

    pub fn layer(&self) -> &PhotoLayer {
        &self.layer
    }

    pub fn last_error(&self) -> Option<&UploadError> {
        self.last_error.as_ref()
    }

    pub fn last_record(&self) -> Option<&PhotoRecord> {
        self.last_record.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.generations.current()
    }

    /// Takes every queued effect in emission order.
    pub fn drain_effects(&mut self) -> Vec<ReviewEffect> {
        self.effects.drain()
    }

    /// Shows already-persisted photos. `viewer` owns records that carry no owner.
    pub fn show_records(&mut self, records: &[PhotoRecord], viewer: &OwnerId) {
        for record in records {
            self.layer
                .insert(record.to_marker(viewer, &self.config.fov_table));
        }
        debug!(count = records.len(), "permanent markers loaded");
    }

    pub fn select_marker(&mut self, id: Option<&PhotoId>) {
        self.layer.select(id);
    }

    /// Starts a review of `file`. Invalid files are refused before any
    /// transition.
    pub fn select_file(
        &mut self,
        file: FileHandle,
        owner_id: OwnerId,
    ) -> Result<Generation, ReviewError> {
        self.expect_state("select a file", &[ReviewState::Idle])?;
        let kind = validate_file(&file, &self.config.limits)?;

        let generation = self.generations.advance();
        debug!(name = %file.name, ?kind, ?generation, "file selected");
        self.pending = Some(PendingUpload::new(file.clone(), owner_id));
        self.transition(ReviewState::FileSelected);
        self.effects
            .emit(ReviewEffect::ExtractMetadata { generation, file });
        Ok(generation)
    }

    /// Completion of the extraction requested under `generation`. Returns
    /// whether the result was applied.
    pub fn metadata_extracted(
        &mut self,
        generation: Generation,
        result: Result<ExtractedMetadata, ExtractionError>,
    ) -> bool {
        if !self.accepts(generation, ReviewState::FileSelected, "metadata") {
            return false;
        }
        let metadata = result.unwrap_or_else(|err| {
            warn!(%err, "continuing without metadata");
            ExtractedMetadata::default()
        });
        let gps = metadata.gps_position();
        let direction = metadata.direction().unwrap_or(Direction::NORTH);

        if let Some(pending) = self.pending.as_mut() {
            pending.metadata = metadata;
        }
        self.transition(ReviewState::Reviewing);
        match gps {
            Some(position) => self.place_preview(position, direction),
            None => debug!("no GPS in metadata; waiting for a map click"),
        }
        true
    }

    /// Places the preview on the first click of a review. Returns whether the
    /// click was used.
    pub fn map_clicked(&mut self, point: GeoPoint) -> bool {
        if self.state != ReviewState::Reviewing {
            return false;
        }
        if self.pending.as_ref().is_none_or(|p| p.has_location()) {
            return false;
        }
        if let Err(err) = point.validate() {
            warn!(%err, "ignoring map click");
            return false;
        }
        self.place_preview(point, Direction::NORTH);
        true
    }

    fn place_preview(&mut self, position: GeoPoint, direction: Direction) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        pending.location = Some(position);
        pending.direction = direction;
        let fov = self
            .config
            .fov_table
            .lookup(pending.metadata.focal_length_mm());

        let preview = MarkerController::preview(position, direction, fov)
            .with_sensitivity(self.config.rotation_sensitivity);
        debug!(?position, direction = direction.degrees(), "preview placed");
        self.effects.emit(ReviewEffect::PreviewUpdated {
            marker: preview.state().clone(),
            geometry: preview.geometry(),
        });
        self.effects.emit(ReviewEffect::CenterMap { point: position });
        self.preview = Some(preview);
    }

    /// Starts a drag on the preview (only while reviewing) or on a permanent
    /// marker. The rotate modifier is read once, here.
    pub fn gesture_start(
        &mut self,
        target: &MarkerId,
        screen_y: f64,
        modifiers: &dyn ModifierKeyObserver,
    ) -> GestureMode {
        match target {
            MarkerId::Preview => match self.editable_preview() {
                Some(preview) => preview.begin_gesture(screen_y, modifiers),
                None => GestureMode::Idle,
            },
            MarkerId::Photo(id) => {
                self.layer
                    .gesture_start(id, screen_y, modifiers.rotate_modifier_pressed())
            }
        }
    }

    /// Applies one pointer move; the host projects the pointer and is told to
    /// pin rotating markers.
    pub fn gesture_move(
        &mut self,
        target: &MarkerId,
        host: &mut dyn MapHost,
        pointer: ScreenPoint,
    ) -> GestureUpdate {
        let MarkerId::Photo(id) = target else {
            let Some(preview) = self.editable_preview() else {
                return GestureUpdate::Ignored;
            };
            let update = preview.drive_move(host, pointer);
            if update != GestureUpdate::Ignored {
                self.sync_pending_from_preview();
            }
            return update;
        };
        self.layer.gesture_move(id, host, pointer)
    }

    pub fn gesture_end(&mut self, target: &MarkerId, host: &mut dyn MapHost) -> Option<MarkerEvent> {
        let MarkerId::Photo(id) = target else {
            let event = self.editable_preview()?.finish_gesture(host)?;
            self.sync_pending_from_preview();
            return Some(event);
        };
        let edit = self.layer.gesture_end(id, host)?;
        let event = edit.event.clone();
        self.effects.emit(ReviewEffect::UpdateMarker {
            update: MarkerUpdate::from(edit),
        });
        Some(event)
    }

    fn editable_preview(&mut self) -> Option<&mut MarkerController> {
        if self.state != ReviewState::Reviewing {
            return None;
        }
        self.preview.as_mut()
    }

    fn sync_pending_from_preview(&mut self) {
        let (Some(preview), Some(pending)) = (self.preview.as_ref(), self.pending.as_mut()) else {
            return;
        };
        pending.location = Some(preview.position());
        pending.direction = preview.direction();
        self.effects.emit(ReviewEffect::PreviewUpdated {
            marker: preview.state().clone(),
            geometry: preview.geometry(),
        });
    }

    /// Submits the reviewed upload. Without a location, or while the preview
    /// is being dragged, nothing happens beyond the returned error.
    pub fn confirm(&mut self) -> Result<Generation, ReviewError> {
        self.expect_state("confirm", &[ReviewState::Reviewing])?;
        if let Some(mode) = self
            .preview
            .as_ref()
            .map(MarkerController::mode)
            .filter(|mode| *mode != GestureMode::Idle)
        {
            return Err(ReviewError::GestureInProgress { mode });
        }
        let request = match self.pending.as_ref() {
            Some(pending) => pending.upload_request()?,
            None => return Err(ReviewError::LocationRequired),
        };
        Ok(self.start_upload(request))
    }

    /// Resends the failed request unchanged.
    pub fn retry(&mut self) -> Result<Generation, ReviewError> {
        self.expect_state("retry", &[ReviewState::Error])?;
        let request = match self.in_flight.clone() {
            Some(request) => request,
            None => match self.pending.as_ref() {
                Some(pending) => pending.upload_request()?,
                None => return Err(ReviewError::LocationRequired),
            },
        };
        Ok(self.start_upload(request))
    }

    fn start_upload(&mut self, request: UploadRequest) -> Generation {
        let generation = self.generations.advance();
        info!(
            name = %request.file.name,
            latitude = request.latitude,
            longitude = request.longitude,
            ?generation,
            "uploading photo"
        );
        self.last_error = None;
        self.in_flight = Some(request.clone());
        self.transition(ReviewState::Uploading);
        self.effects.emit(ReviewEffect::Upload {
            generation,
            request,
        });
        generation
    }

    /// Completion of the upload requested under `generation`. Returns whether
    /// the result was applied.
    pub fn upload_finished(
        &mut self,
        generation: Generation,
        result: Result<PhotoRecord, UploadError>,
    ) -> bool {
        if !self.accepts(generation, ReviewState::Uploading, "upload") {
            return false;
        }
        match result {
            Ok(record) => {
                info!(id = %record.id, "photo uploaded");
                let marker = match self.pending.take() {
                    Some(pending) => {
                        let reviewed = pending.metadata.with_direction(pending.direction);
                        record.to_marker_with(&pending.owner_id, &reviewed, &self.config.fov_table)
                    }
                    None => {
                        let owner = record.user_id.clone().unwrap_or_else(|| OwnerId::new(""));
                        record.to_marker(&owner, &self.config.fov_table)
                    }
                };
                self.layer.insert(marker);
                self.remove_preview();
                self.in_flight = None;
                self.last_record = Some(record.clone());
                self.transition(ReviewState::Success);
                self.effects.emit(ReviewEffect::Published { record });
            }
            Err(error) => {
                warn!(%error, "upload failed");
                self.last_error = Some(error.clone());
                self.transition(ReviewState::Error);
                self.effects.emit(ReviewEffect::UploadFailed { error });
            }
        }
        true
    }

    /// Clears the finished review and asks the host for the next file.
    pub fn upload_another(&mut self) -> Result<(), ReviewError> {
        self.expect_state(
            "upload another",
            &[ReviewState::Success, ReviewState::Error],
        )?;
        self.reset();
        self.effects.emit(ReviewEffect::OpenFilePicker);
        Ok(())
    }

    /// Abandons the review. Outstanding extraction or upload results are
    /// dropped when they arrive.
    pub fn cancel(&mut self) -> Result<(), ReviewError> {
        self.expect_state(
            "cancel",
            &[
                ReviewState::FileSelected,
                ReviewState::Reviewing,
                ReviewState::Uploading,
                ReviewState::Success,
                ReviewState::Error,
            ],
        )?;
        if self.state == ReviewState::Uploading {
            warn!("cancelled while uploading; the result will be ignored");
        }
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.generations.advance();
        self.pending = None;
        self.in_flight = None;
        self.last_error = None;
        self.remove_preview();
        self.transition(ReviewState::Idle);
    }

    fn remove_preview(&mut self) {
        if self.preview.take().is_some() {
            self.effects.emit(ReviewEffect::PreviewRemoved);
        }
    }

    fn accepts(&self, generation: Generation, expected: ReviewState, what: &str) -> bool {
        if !self.generations.is_current(generation) || self.state != expected {
            warn!(
                ?generation,
                current = ?self.generations.current(),
                state = ?self.state,
                "dropping stale {what} result"
            );
            return false;
        }
        true
    }

    fn expect_state(
        &self,
        action: &'static str,
        allowed: &[ReviewState],
    ) -> Result<(), ReviewError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ReviewError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, to: ReviewState) {
        let from = self.state;
        if from == to {
            return;
        }
        debug!(?from, ?to, "review state");
        self.state = to;
        self.effects.emit(ReviewEffect::StateChanged { from, to });
    }
}
