//! Screen orchestration: tap to capture, fan out to every model, render
//!
//! All screen state lives in [`ViewController`] and is only touched from its
//! event loop. Capture and inference run as spawned tasks that post their
//! completions back to the loop, so region updates are applied one at a time
//! in whatever order the models finish.

use crate::camera::{CameraManager, CapturedImage, PreviewStatus};
use crate::error::VisionError;
use crate::models::{ModelKind, ModelRegistry};
use crate::prediction::{Prediction, PredictionRunner};
use crate::presenter::Region;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Input from the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// Tap on the camera view
    Tap,
    Shutdown,
}

/// Progress of a capture cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// Camera asked for a still
    AwaitingStill,
    /// Still captured, `pending` models have not reported back
    Predicting { pending: usize },
    /// Every model reported back
    Settled,
}

/// Global screen state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenState {
    /// Camera not started (permission pending, denied, or start failed)
    Inactive,
    /// Live preview, a tap captures
    Scanning,
    /// Preview stopped on a capture, a tap resumes scanning once settled
    Captured(CapturePhase),
}

/// Rendering surface for the regions and the preview
pub trait View: Send {
    fn render_region(&mut self, region: &Region);

    fn preview_changed(&mut self, _live: bool) {}
}

enum Completion {
    Preview {
        generation: u64,
        status: PreviewStatus,
    },
    Still {
        generation: u64,
        result: Result<CapturedImage, VisionError>,
    },
    Prediction {
        generation: u64,
        kind: ModelKind,
        outcome: Result<Prediction, VisionError>,
    },
}

enum Next {
    Ui(Option<UiEvent>),
    Completion(Completion),
}

/// Drives the capture → predict → render cycle
pub struct ViewController<V: View> {
    camera: Arc<CameraManager>,
    registry: Arc<ModelRegistry>,
    runner: PredictionRunner,
    regions: Vec<Region>,
    state: ScreenState,
    generation: u64,
    image: Option<CapturedImage>,
    view: V,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<V: View> ViewController<V> {
    pub fn new(camera: Arc<CameraManager>, registry: Arc<ModelRegistry>, view: V) -> Self {
        let regions = registry.kinds().map(Region::new).collect();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Self {
            camera,
            registry,
            runner: PredictionRunner::default(),
            regions,
            state: ScreenState::Inactive,
            generation: 0,
            image: None,
            view,
            completions_tx,
            completions_rx,
        }
    }

    pub fn state(&self) -> ScreenState {
        self.state
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, kind: ModelKind) -> Option<&Region> {
        self.regions.iter().find(|r| r.kind == kind)
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Last captured still, until scanning resumes
    pub fn captured_image(&self) -> Option<&CapturedImage> {
        self.image.as_ref()
    }

    /// A capture or prediction is still outstanding
    pub fn has_pending_work(&self) -> bool {
        matches!(
            self.state,
            ScreenState::Captured(CapturePhase::AwaitingStill)
                | ScreenState::Captured(CapturePhase::Predicting { .. })
        )
    }

    /// Screen became visible: draw placeholders, ask for camera access and
    /// start scanning if granted
    pub async fn appear(&mut self) {
        self.reset_regions();

        if !self.camera.request_access().await {
            warn!("{}, scanning will not start", VisionError::PermissionDenied);
            self.state = ScreenState::Inactive;
            return;
        }

        self.start_scanning();
    }

    /// Handle a tap on the camera view
    pub fn tap(&mut self) {
        match self.state {
            ScreenState::Inactive => debug!("Tap ignored, camera inactive"),
            ScreenState::Scanning => self.arm_capture(),
            ScreenState::Captured(CapturePhase::Settled) => self.resume_scanning(),
            ScreenState::Captured(phase) => debug!("Tap ignored while {:?}", phase),
        }
    }

    /// Wait until the current capture cycle has fully resolved
    pub async fn settle(&mut self) {
        while self.has_pending_work() {
            match self.completions_rx.recv().await {
                Some(completion) => self.apply(completion),
                None => break,
            }
        }
    }

    /// Event loop: screen events and task completions, one at a time, until
    /// `Shutdown` or the event channel closes. Returns the view.
    pub async fn run(mut self, mut events: mpsc::Receiver<UiEvent>) -> V {
        self.appear().await;

        loop {
            let next = tokio::select! {
                event = events.recv() => Next::Ui(event),
                Some(completion) = self.completions_rx.recv() => Next::Completion(completion),
            };

            match next {
                Next::Ui(Some(UiEvent::Tap)) => self.tap(),
                Next::Ui(Some(UiEvent::Shutdown)) | Next::Ui(None) => break,
                Next::Completion(completion) => self.apply(completion),
            }
        }

        self.camera.stop();
        info!("Screen closed");
        self.view
    }

    fn start_scanning(&mut self) {
        info!("Start scanning");
        match self.camera.start() {
            Ok(started) => {
                self.state = ScreenState::Scanning;
                let generation = self.generation;
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    let status = started.wait().await;
                    let _ = tx.send(Completion::Preview { generation, status });
                });
            }
            Err(e) => {
                error!("Failed to start scanning: {}", e);
                self.state = ScreenState::Inactive;
            }
        }
    }

    fn arm_capture(&mut self) {
        self.generation += 1;
        self.state = ScreenState::Captured(CapturePhase::AwaitingStill);
        for region in &mut self.regions {
            region.set_busy();
            self.view.render_region(region);
        }

        let generation = self.generation;
        let camera = self.camera.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = camera.capture_still().await;
            info!("Stop scanning");
            camera.stop();
            let _ = tx.send(Completion::Still { generation, result });
        });
    }

    fn resume_scanning(&mut self) {
        self.generation += 1;
        self.image = None;
        self.reset_regions();
        self.start_scanning();
    }

    fn reset_regions(&mut self) {
        for region in &mut self.regions {
            region.reset();
            self.view.render_region(region);
        }
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Preview { generation, status } => {
                if generation != self.generation || self.state != ScreenState::Scanning {
                    return;
                }
                match status {
                    PreviewStatus::Live => self.view.preview_changed(true),
                    PreviewStatus::Stopped => {}
                    PreviewStatus::Failed(e) => {
                        error!("Failed to start scanning: {}", e);
                        self.state = ScreenState::Inactive;
                        self.view.preview_changed(false);
                    }
                }
            }
            Completion::Still { generation, result } => {
                if generation != self.generation {
                    debug!("Dropping stale capture from cycle {}", generation);
                    return;
                }
                self.view.preview_changed(false);

                match result {
                    Ok(image) => {
                        debug!("Captured {} bytes at {}", image.data.len(), image.captured_at);
                        self.image = Some(image.clone());
                        self.dispatch_predictions(image);
                    }
                    Err(e) => {
                        error!("An error occurred when capturing image: {}", e);
                        self.reset_regions();
                        self.start_scanning();
                    }
                }
            }
            Completion::Prediction {
                generation,
                kind,
                outcome,
            } => {
                if generation != self.generation {
                    debug!("Dropping stale {} prediction from cycle {}", kind, generation);
                    return;
                }
                self.show_outcome(kind, outcome);
            }
        }
    }

    fn dispatch_predictions(&mut self, image: CapturedImage) {
        let kinds: Vec<ModelKind> = self.registry.kinds().collect();
        if kinds.is_empty() {
            self.state = ScreenState::Captured(CapturePhase::Settled);
            return;
        }
        self.state = ScreenState::Captured(CapturePhase::Predicting {
            pending: kinds.len(),
        });

        let generation = self.generation;
        let registry = self.registry.clone();
        let runner = self.runner.clone();
        let tx = self.completions_tx.clone();

        tokio::spawn(async move {
            let mut pending: FuturesUnordered<_> = kinds
                .into_iter()
                .map(|kind| {
                    let model = registry.get(kind);
                    let image = image.clone();
                    let runner = runner.clone();
                    async move {
                        let outcome = match model {
                            Ok(model) => tokio::task::spawn_blocking(move || {
                                runner.predict(&image, model.as_ref())
                            })
                            .await
                            .unwrap_or_else(|e| {
                                Err(VisionError::Processing(format!("Prediction task failed: {}", e)))
                            }),
                            Err(e) => Err(e),
                        };
                        (kind, outcome)
                    }
                })
                .collect();

            while let Some((kind, outcome)) = pending.next().await {
                if tx
                    .send(Completion::Prediction {
                        generation,
                        kind,
                        outcome,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });
    }

    fn show_outcome(&mut self, kind: ModelKind, outcome: Result<Prediction, VisionError>) {
        let Some(region) = self.regions.iter_mut().find(|r| r.kind == kind) else {
            warn!("No region for model {}", kind);
            return;
        };

        match &outcome {
            Ok(prediction) => {
                info!("{} finished in {:.2}s", kind, prediction.latency.as_secs_f64());
                region.show_prediction(prediction);
            }
            Err(e) => {
                error!("Failed to perform {} prediction: {}", kind, e);
                region.show_error();
            }
        }
        self.view.render_region(region);

        if let ScreenState::Captured(CapturePhase::Predicting { pending }) = self.state {
            let pending = pending.saturating_sub(1);
            self.state = if pending == 0 {
                info!("All predictions settled");
                ScreenState::Captured(CapturePhase::Settled)
            } else {
                ScreenState::Captured(CapturePhase::Predicting { pending })
            };
        }
    }
}
