//! Camera session management and still capture

#[cfg(feature = "opencv")]
mod device;
mod replay;

#[cfg(feature = "opencv")]
pub use device::OpenCvSource;
pub use replay::ReplaySource;

use crate::config::VisionConfig;
use crate::error::VisionError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Encoded bytes of a single still photo
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub data: Bytes,
    pub captured_at: DateTime<Utc>,
}

impl CapturedImage {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            captured_at: Utc::now(),
        }
    }
}

/// Camera hardware behind a capture session.
///
/// All methods may block and are called from blocking threads.
pub trait FrameSource: Send {
    /// Ask for permission to use the camera
    fn request_access(&mut self) -> bool {
        true
    }

    /// Open the device
    fn open(&mut self) -> Result<(), VisionError>;

    /// Read one frame, encoded (JPEG or PNG)
    fn read_frame(&mut self) -> Result<Bytes, VisionError>;

    /// Release the device
    fn close(&mut self);
}

/// How a started session ended up
#[derive(Debug)]
pub enum PreviewStatus {
    /// First preview frame arrived
    Live,
    /// Session was stopped before producing a frame
    Stopped,
    /// Source could not be opened
    Failed(VisionError),
}

/// Resolves once the session started streaming, failed, or was stopped
pub struct StartedSignal(oneshot::Receiver<PreviewStatus>);

impl StartedSignal {
    pub async fn wait(self) -> PreviewStatus {
        self.0.await.unwrap_or(PreviewStatus::Stopped)
    }
}

/// Owns the live capture session.
///
/// The source mutex is only ever taken on blocking threads. A read that hangs
/// in the device keeps the lock, so open and close are queued behind it
/// instead of stalling the async side.
pub struct CameraManager {
    config: Arc<VisionConfig>,
    source: Arc<Mutex<Box<dyn FrameSource>>>,
    is_running: Arc<RwLock<bool>>,
    /// Bumped on every start and stop; work from an older session is skipped
    epoch: Arc<AtomicU64>,
    latest: Arc<RwLock<Option<CapturedImage>>>,
    stream_handle: Mutex<Option<JoinHandle<()>>>,
    closing: Mutex<Option<JoinHandle<()>>>,
}

impl CameraManager {
    /// Create a new camera manager over a frame source
    pub fn new(config: Arc<VisionConfig>, source: Box<dyn FrameSource>) -> Self {
        Self {
            config,
            source: Arc::new(Mutex::new(source)),
            is_running: Arc::new(RwLock::new(false)),
            epoch: Arc::new(AtomicU64::new(0)),
            latest: Arc::new(RwLock::new(None)),
            stream_handle: Mutex::new(None),
            closing: Mutex::new(None),
        }
    }

    /// Ask the source for camera permission
    pub async fn request_access(&self) -> bool {
        let source = self.source.clone();
        match tokio::task::spawn_blocking(move || source.lock().request_access()).await {
            Ok(granted) => granted,
            Err(e) => {
                error!("Camera permission request failed: {}", e);
                false
            }
        }
    }

    /// Start a session: open the source in the background and stream preview
    /// frames. Must be called within a tokio runtime.
    pub fn start(&self) -> Result<StartedSignal, VisionError> {
        {
            let mut is_running = self.is_running.write();
            if *is_running {
                return Err(VisionError::Camera("Camera stream already running".to_string()));
            }
            *is_running = true;
        }
        let session = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let (started_tx, started_rx) = oneshot::channel();
        let frame_rate = self.config.frame_rate.max(1);
        let frame_interval = Duration::from_secs_f64(1.0 / frame_rate as f64);
        let pending_close = self.closing.lock().take();
        let source = self.source.clone();
        let is_running = self.is_running.clone();
        let epoch = self.epoch.clone();
        let latest = self.latest.clone();

        let handle = tokio::spawn(async move {
            if let Some(close) = pending_close {
                let _ = close.await;
            }

            let opener = source.clone();
            let current = epoch.clone();
            let opened = tokio::task::spawn_blocking(move || {
                let mut source = opener.lock();
                if current.load(Ordering::SeqCst) != session {
                    return Ok(());
                }
                source.open()
            })
            .await
            .map_err(|e| VisionError::Camera(format!("Camera open task failed: {}", e)))
            .and_then(|result| result);

            if let Err(e) = opened {
                error!("Failed to open camera: {}", e);
                if epoch.load(Ordering::SeqCst) == session {
                    *is_running.write() = false;
                }
                let _ = started_tx.send(PreviewStatus::Failed(e));
                return;
            }
            info!("Camera stream started at {}fps", frame_rate);

            let mut started_tx = Some(started_tx);
            loop {
                if !*is_running.read() || epoch.load(Ordering::SeqCst) != session {
                    break;
                }

                let tick = Instant::now();
                let reader = source.clone();
                match tokio::task::spawn_blocking(move || reader.lock().read_frame()).await {
                    Ok(Ok(data)) => {
                        *latest.write() = Some(CapturedImage::new(data));
                        if let Some(tx) = started_tx.take() {
                            info!("Capture session started");
                            let _ = tx.send(PreviewStatus::Live);
                        }
                    }
                    Ok(Err(e)) => {
                        error!("Camera read error: {}", e);
                    }
                    Err(e) => {
                        error!("Camera read task failed: {}", e);
                        break;
                    }
                }

                let elapsed = tick.elapsed();
                if elapsed < frame_interval {
                    tokio::time::sleep(frame_interval - elapsed).await;
                }
            }

            debug!("Preview loop exited");
        });

        *self.stream_handle.lock() = Some(handle);
        Ok(StartedSignal(started_rx))
    }

    /// Capture a still from the running session.
    ///
    /// Returns the frame currently shown in the preview, or reads a fresh one
    /// if the preview has not produced a frame yet.
    pub async fn capture_still(&self) -> Result<CapturedImage, VisionError> {
        if !self.is_running() {
            return Err(VisionError::Camera("Capture session is not running".to_string()));
        }

        if let Some(frame) = self.latest.read().clone() {
            return Ok(frame);
        }

        let source = self.source.clone();
        let timeout_ms = self.config.capture_timeout_ms;
        let read = tokio::task::spawn_blocking(move || source.lock().read_frame());

        match tokio::time::timeout(Duration::from_millis(timeout_ms), read).await {
            Ok(Ok(Ok(data))) => Ok(CapturedImage::new(data)),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(VisionError::Camera(format!("Capture task failed: {}", e))),
            Err(_) => Err(VisionError::Camera(format!(
                "Still capture timed out after {}ms",
                timeout_ms
            ))),
        }
    }

    /// Stop the stream and release the source. No-op when idle.
    ///
    /// Never waits for the device: closing is queued on a blocking thread
    /// behind any read still in flight, and the next `start` waits for it.
    pub fn stop(&self) {
        let was_running = std::mem::replace(&mut *self.is_running.write(), false);
        self.epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(handle) = self.stream_handle.lock().take() {
            handle.abort();
        }
        *self.latest.write() = None;

        if was_running {
            self.close_source();
            info!("Camera stopped");
        }
    }

    fn close_source(&self) {
        let source = self.source.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let close = runtime.spawn_blocking(move || source.lock().close());
                *self.closing.lock() = Some(close);
            }
            // No runtime left to stall
            Err(_) => source.lock().close(),
        }
    }

    /// Check if camera is running
    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        self.stop();
    }
}
