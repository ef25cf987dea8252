//! Runs an [`UploadOrchestrator`] against async collaborators and a map host.
//!
//! User input is applied synchronously. Effects the orchestrator queues are
//! executed right after each input: map effects go to the host, extraction
//! and upload calls are spawned as tasks whose results come back over an
//! mpsc channel tagged with their generation.

use std::sync::Arc;
use std::time::Duration;

use foundation::ids::{OwnerId, PhotoId};
use foundation::math::ScreenPoint;
use markers::{
    GestureMode, GestureUpdate, KeyboardModifiers, MapHost, MarkerEvent, MarkerGeometry,
    MarkerId, ModifierKey,
};
use runtime::Generation;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use upload::{
    ExtractedMetadata, ExtractionError, FileHandle, MarkerUpdate, PhotoRecord, ReviewConfig,
    ReviewEffect, ReviewError, UploadError, UploadOrchestrator, UploadRequest,
};

use crate::collaborators::{MetadataExtractor, PhotoUploader};

#[derive(Debug)]
enum Completion {
    Metadata {
        generation: Generation,
        result: Result<ExtractedMetadata, ExtractionError>,
    },
    Upload {
        generation: Generation,
        result: Result<PhotoRecord, UploadError>,
    },
    MarkerSaved {
        photo: PhotoId,
        result: Result<(), UploadError>,
    },
}

/// Upload call bounded by `limit`; an elapsed limit reads as `TimedOut`.
pub async fn upload_with_timeout(
    uploader: &dyn PhotoUploader,
    request: UploadRequest,
    limit: Duration,
) -> Result<PhotoRecord, UploadError> {
    match tokio::time::timeout(limit, uploader.upload(request)).await {
        Ok(result) => result,
        Err(_) => Err(UploadError::TimedOut {
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

pub struct ReviewDriver<H: MapHost> {
    orchestrator: UploadOrchestrator,
    extractor: Arc<dyn MetadataExtractor>,
    uploader: Arc<dyn PhotoUploader>,
    host: H,
    modifiers: KeyboardModifiers,
    upload_timeout: Duration,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    outstanding: usize,
    preview_render: Option<MarkerGeometry>,
    history: Vec<ReviewEffect>,
    failed_writes: Vec<(PhotoId, UploadError)>,
}

impl<H: MapHost> ReviewDriver<H> {
    pub fn new(
        config: ReviewConfig,
        extractor: Arc<dyn MetadataExtractor>,
        uploader: Arc<dyn PhotoUploader>,
        host: H,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let upload_timeout = config.upload_timeout();
        Self {
            orchestrator: UploadOrchestrator::new(config),
            extractor,
            uploader,
            host,
            modifiers: KeyboardModifiers::default(),
            upload_timeout,
            tx,
            rx,
            outstanding: 0,
            preview_render: None,
            history: Vec::new(),
            failed_writes: Vec::new(),
        }
    }

    pub fn orchestrator(&self) -> &UploadOrchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut UploadOrchestrator {
        &mut self.orchestrator
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Latest preview drawing, `None` once the preview is gone.
    pub fn preview_render(&self) -> Option<&MarkerGeometry> {
        self.preview_render.as_ref()
    }

    /// Every effect executed so far, in order.
    pub fn history(&self) -> &[ReviewEffect] {
        &self.history
    }

    /// Marker write-backs the uploader refused.
    pub fn failed_writes(&self) -> &[(PhotoId, UploadError)] {
        &self.failed_writes
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn key_down(&mut self, key: ModifierKey) {
        self.modifiers.key_down(key);
    }

    pub fn key_up(&mut self, key: ModifierKey) {
        self.modifiers.key_up(key);
    }

    pub fn blur(&mut self) {
        self.modifiers.blur();
    }

    pub fn select_file(&mut self, file: FileHandle, owner: OwnerId) -> Result<Generation, ReviewError> {
        let generation = self.orchestrator.select_file(file, owner)?;
        self.run_effects();
        Ok(generation)
    }

    /// Map click at a screen point.
    pub fn click(&mut self, pointer: ScreenPoint) -> bool {
        let point = self.host.screen_point_to_geo(pointer);
        let placed = self.orchestrator.map_clicked(point);
        self.run_effects();
        placed
    }

    pub fn pointer_down(&mut self, target: &MarkerId, pointer: ScreenPoint) -> GestureMode {
        let mode = self
            .orchestrator
            .gesture_start(target, pointer.y, &self.modifiers);
        self.run_effects();
        mode
    }

    pub fn pointer_move(&mut self, target: &MarkerId, pointer: ScreenPoint) -> GestureUpdate {
        let update = self
            .orchestrator
            .gesture_move(target, &mut self.host, pointer);
        self.run_effects();
        update
    }

    pub fn pointer_up(&mut self, target: &MarkerId) -> Option<MarkerEvent> {
        let event = self.orchestrator.gesture_end(target, &mut self.host);
        self.run_effects();
        event
    }

    pub fn confirm(&mut self) -> Result<Generation, ReviewError> {
        let generation = self.orchestrator.confirm()?;
        self.run_effects();
        Ok(generation)
    }

    pub fn retry(&mut self) -> Result<Generation, ReviewError> {
        let generation = self.orchestrator.retry()?;
        self.run_effects();
        Ok(generation)
    }

    pub fn cancel(&mut self) -> Result<(), ReviewError> {
        self.orchestrator.cancel()?;
        self.run_effects();
        Ok(())
    }

    pub fn upload_another(&mut self) -> Result<(), ReviewError> {
        self.orchestrator.upload_another()?;
        self.run_effects();
        Ok(())
    }

    /// Applies the next async completion. Returns `false` when nothing is
    /// outstanding.
    pub async fn step(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }
        let Some(completion) = self.rx.recv().await else {
            return false;
        };
        self.outstanding -= 1;
        self.apply(completion);
        self.run_effects();
        true
    }

    /// Runs until every spawned call has reported back.
    pub async fn settle(&mut self) {
        while self.step().await {}
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Metadata { generation, result } => {
                self.orchestrator.metadata_extracted(generation, result);
            }
            Completion::Upload { generation, result } => {
                self.orchestrator.upload_finished(generation, result);
            }
            Completion::MarkerSaved { photo, result } => match result {
                Ok(()) => debug!(%photo, "marker saved"),
                Err(error) => {
                    warn!(%photo, %error, "marker write-back failed");
                    self.failed_writes.push((photo, error));
                }
            },
        }
    }

    fn run_effects(&mut self) {
        for effect in self.orchestrator.drain_effects() {
            self.execute(&effect);
            self.history.push(effect);
        }
    }

    fn execute(&mut self, effect: &ReviewEffect) {
        match effect {
            ReviewEffect::StateChanged { from, to } => debug!(?from, ?to, "state changed"),
            ReviewEffect::ExtractMetadata { generation, file } => {
                let generation = *generation;
                let file = file.clone();
                let extractor = Arc::clone(&self.extractor);
                self.spawn(
                    async move {
                        let result = extractor.extract(file).await;
                        Completion::Metadata { generation, result }
                    },
                    move |reason| Completion::Metadata {
                        generation,
                        result: Err(ExtractionError(reason)),
                    },
                );
            }
            ReviewEffect::CenterMap { point } => self.host.center_on(*point),
            ReviewEffect::PreviewUpdated { geometry, .. } => {
                self.preview_render = Some(geometry.clone());
            }
            ReviewEffect::PreviewRemoved => self.preview_render = None,
            ReviewEffect::Upload {
                generation,
                request,
            } => {
                let generation = *generation;
                let request = request.clone();
                let uploader = Arc::clone(&self.uploader);
                let limit = self.upload_timeout;
                self.spawn(
                    async move {
                        let result = upload_with_timeout(uploader.as_ref(), request, limit).await;
                        Completion::Upload { generation, result }
                    },
                    move |reason| Completion::Upload {
                        generation,
                        result: Err(UploadError::Transport(reason)),
                    },
                );
            }
            ReviewEffect::UploadFailed { error } => warn!(%error, "upload failed; retry or cancel"),
            ReviewEffect::Published { record } => {
                info!(id = %record.id, "photo published");
            }
            ReviewEffect::UpdateMarker { update } => {
                let update: MarkerUpdate = update.clone();
                let photo = update.photo().clone();
                let uploader = Arc::clone(&self.uploader);
                self.spawn(
                    {
                        let photo = photo.clone();
                        async move {
                            let result = uploader.update_marker(update).await;
                            Completion::MarkerSaved { photo, result }
                        }
                    },
                    move |reason| Completion::MarkerSaved {
                        photo,
                        result: Err(UploadError::Transport(reason)),
                    },
                );
            }
            ReviewEffect::OpenFilePicker => debug!("file picker requested"),
        }
    }

    /// Runs `task` on its own tokio task. Every spawn reports exactly one
    /// completion: if the task panics or is aborted, `on_abort` builds a
    /// failed one from the join error.
    fn spawn<F, A>(&mut self, task: F, on_abort: A)
    where
        F: std::future::Future<Output = Completion> + Send + 'static,
        A: FnOnce(String) -> Completion + Send + 'static,
    {
        let tx = self.tx.clone();
        self.outstanding += 1;
        let work = tokio::spawn(task);
        tokio::spawn(async move {
            let completion = match work.await {
                Ok(completion) => completion,
                Err(err) => {
                    warn!(%err, "collaborator task did not finish");
                    on_abort(format!("collaborator task did not finish: {err}"))
                }
            };
            // The receiver lives as long as the driver; a send failure means
            // the driver is gone and nobody wants the result.
            let _ = tx.send(completion);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{upload_with_timeout, ReviewDriver};
    use crate::collaborators::{BoxFuture, InMemoryUploader, PhotoUploader, ScriptedExtractor};
    use foundation::ids::{OwnerId, PhotoId};
    use foundation::math::{Direction, GeoPoint, ScreenPoint};
    use markers::{GestureMode, LocalViewport, MapHost, MarkerId, ModifierKey};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use upload::{
        DirectionInfo, ExtractedMetadata, FileHandle, GpsInfo, MarkerUpdate, PhotoRecord,
        ReviewConfig, ReviewEffect, ReviewState, UploadError, UploadRequest,
    };

    const HOME: GeoPoint = GeoPoint::new(37.5, 127.0);

    fn file(blob: u64) -> FileHandle {
        FileHandle {
            blob,
            name: format!("IMG_{blob}.jpg"),
            size_bytes: 4096,
            mime_type: Some("image/jpeg".into()),
        }
    }

    fn gps(latitude: f64, longitude: f64, degrees: f64) -> ExtractedMetadata {
        ExtractedMetadata {
            gps: Some(GpsInfo {
                latitude,
                longitude,
                has_gps: true,
            }),
            direction: Some(DirectionInfo {
                degrees,
                has_direction: true,
            }),
            camera: None,
        }
    }

    fn driver(
        config: ReviewConfig,
        extractor: ScriptedExtractor,
    ) -> (ReviewDriver<LocalViewport>, Arc<InMemoryUploader>) {
        let uploader = Arc::new(InMemoryUploader::new());
        let host = LocalViewport::new(
            config.map_center,
            1.0,
            ScreenPoint::new(800.0, 600.0),
        );
        let driver = ReviewDriver::new(config, Arc::new(extractor), uploader.clone(), host);
        (driver, uploader)
    }

    #[tokio::test]
    async fn gps_photo_is_rotated_and_published() {
        let (mut d, uploader) = driver(
            ReviewConfig::default(),
            ScriptedExtractor::new().with_metadata(1, gps(37.5, 127.0, 90.0)),
        );

        d.select_file(file(1), OwnerId::new("u1")).expect("select");
        assert_eq!(d.outstanding(), 1);
        d.settle().await;
        assert_eq!(d.orchestrator().state(), ReviewState::Reviewing);
        assert_eq!(d.host().center(), HOME);
        assert!(d.preview_render().is_some());

        d.key_down(ModifierKey::Shift);
        let anchor = d.host().geo_to_screen_point(HOME);
        assert_eq!(d.pointer_down(&MarkerId::Preview, anchor), GestureMode::Rotating);
        d.key_up(ModifierKey::Shift);
        d.pointer_move(
            &MarkerId::Preview,
            ScreenPoint::new(anchor.x + 40.0, anchor.y - 100.0),
        );
        assert_eq!(d.host().pinned_position(&MarkerId::Preview), Some(HOME));
        d.pointer_up(&MarkerId::Preview);
        assert_eq!(
            d.orchestrator().pending().map(|p| p.direction),
            Some(Direction::new(270.0))
        );

        d.confirm().expect("confirm");
        assert_eq!(d.orchestrator().state(), ReviewState::Uploading);
        d.settle().await;
        assert_eq!(d.orchestrator().state(), ReviewState::Success);
        assert!(d.preview_render().is_none());

        let stored = uploader.records();
        assert_eq!(stored.len(), 1);
        let marker = d.orchestrator().layer().get(&stored[0].id).expect("marker");
        assert_eq!(marker.position, HOME);
        assert_eq!(marker.direction, Direction::new(270.0));
    }

    #[tokio::test]
    async fn click_places_preview_without_gps() {
        let (mut d, _) = driver(ReviewConfig::default(), ScriptedExtractor::new());
        d.select_file(file(9), OwnerId::new("u1")).expect("select");
        d.settle().await;
        assert_eq!(d.orchestrator().state(), ReviewState::Reviewing);
        assert_eq!(d.orchestrator().pending().and_then(|p| p.location), None);

        assert!(d.click(ScreenPoint::new(500.0, 200.0)));
        let placed = d.orchestrator().pending().and_then(|p| p.location);
        assert!(placed.is_some());
        assert!(!d.click(ScreenPoint::new(100.0, 100.0)));
        assert_eq!(d.orchestrator().pending().and_then(|p| p.location), placed);
        assert_eq!(Some(d.host().center()), placed);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upload_times_out_and_retry_succeeds() {
        let config = ReviewConfig {
            upload_timeout_ms: 50,
            ..ReviewConfig::default()
        };
        let (mut d, uploader) = driver(
            config,
            ScriptedExtractor::new().with_metadata(1, gps(37.5, 127.0, 0.0)),
        );
        d.select_file(file(1), OwnerId::new("u1")).expect("select");
        d.settle().await;

        uploader.set_delay(Duration::from_secs(5));
        d.confirm().expect("confirm");
        d.settle().await;
        assert_eq!(d.orchestrator().state(), ReviewState::Error);
        assert_eq!(
            d.orchestrator().last_error(),
            Some(&UploadError::TimedOut { after_ms: 50 })
        );
        assert!(d.preview_render().is_some());

        uploader.set_delay(Duration::ZERO);
        d.retry().expect("retry");
        d.settle().await;
        assert_eq!(d.orchestrator().state(), ReviewState::Success);
        assert_eq!(uploader.records().len(), 1);
    }

    #[tokio::test]
    async fn failed_upload_retries_same_request() {
        let (mut d, uploader) = driver(
            ReviewConfig::default(),
            ScriptedExtractor::new().with_metadata(1, gps(37.5, 127.0, 45.0)),
        );
        d.select_file(file(1), OwnerId::new("u1")).expect("select");
        d.settle().await;

        uploader.fail_next(UploadError::Rejected {
            status: 500,
            message: "disk full".into(),
        });
        d.confirm().expect("confirm");
        d.settle().await;
        assert_eq!(d.orchestrator().state(), ReviewState::Error);

        d.retry().expect("retry");
        d.settle().await;
        let requests: Vec<UploadRequest> = uploader.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(d.orchestrator().state(), ReviewState::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_late_extraction() {
        let (mut d, _) = driver(
            ReviewConfig::default(),
            ScriptedExtractor::new()
                .with_metadata(1, gps(1.0, 2.0, 0.0))
                .with_delay(Duration::from_millis(100)),
        );
        d.select_file(file(1), OwnerId::new("u1")).expect("select");
        d.cancel().expect("cancel");
        d.settle().await;
        assert_eq!(d.orchestrator().state(), ReviewState::Idle);
        assert!(d.orchestrator().pending().is_none());
        assert!(!d
            .history()
            .iter()
            .any(|e| matches!(e, ReviewEffect::CenterMap { .. })));
    }

    #[tokio::test]
    async fn permanent_marker_edit_is_written_back() {
        let (mut d, uploader) = driver(
            ReviewConfig::default(),
            ScriptedExtractor::new().with_metadata(1, gps(37.5, 127.0, 0.0)),
        );
        d.select_file(file(1), OwnerId::new("u1")).expect("select");
        d.settle().await;
        d.confirm().expect("confirm");
        d.settle().await;
        d.upload_another().expect("another");
        assert!(d.history().contains(&ReviewEffect::OpenFilePicker));

        let id: PhotoId = uploader.records()[0].id.clone();
        let target = MarkerId::Photo(id.clone());
        let at = d.host().geo_to_screen_point(HOME);
        d.pointer_down(&target, at);
        let moved_to = ScreenPoint::new(at.x + 100.0, at.y);
        d.pointer_move(&target, moved_to);
        d.pointer_up(&target);
        d.settle().await;

        let expected = d.host().screen_point_to_geo(moved_to);
        assert_eq!(uploader.record(&id).map(|r| r.location), Some(expected));
        assert!(d.failed_writes().is_empty());
    }

    struct PanickingUploader;

    impl PhotoUploader for PanickingUploader {
        fn upload(&self, _: UploadRequest) -> BoxFuture<'_, Result<PhotoRecord, UploadError>> {
            Box::pin(async { panic!("uploader crashed") })
        }

        fn update_marker(&self, _: MarkerUpdate) -> BoxFuture<'_, Result<(), UploadError>> {
            Box::pin(async { panic!("uploader crashed") })
        }
    }

    #[tokio::test]
    async fn crashed_upload_task_reports_a_failure() {
        let config = ReviewConfig::default();
        let host = LocalViewport::new(config.map_center, 1.0, ScreenPoint::new(800.0, 600.0));
        let extractor = ScriptedExtractor::new().with_metadata(1, gps(37.5, 127.0, 0.0));
        let mut d = ReviewDriver::new(
            config,
            Arc::new(extractor),
            Arc::new(PanickingUploader),
            host,
        );
        d.select_file(file(1), OwnerId::new("u1")).expect("select");
        d.settle().await;

        d.confirm().expect("confirm");
        d.settle().await;
        assert_eq!(d.outstanding(), 0);
        assert_eq!(d.orchestrator().state(), ReviewState::Error);
        assert!(matches!(
            d.orchestrator().last_error(),
            Some(UploadError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn timeout_helper_passes_fast_results_through() {
        let uploader = InMemoryUploader::new();
        let request = UploadRequest {
            file: file(1),
            owner_id: OwnerId::new("u1"),
            latitude: 1.0,
            longitude: 2.0,
            metadata_json: "{}".into(),
        };
        let record = upload_with_timeout(&uploader, request, Duration::from_secs(1))
            .await
            .expect("record");
        assert_eq!(record.location, GeoPoint::new(1.0, 2.0));
    }
}
