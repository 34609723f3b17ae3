//! USB webcam frame source backed by OpenCV

use super::FrameSource;
use crate::config::VisionConfig;
use crate::error::VisionError;
use bytes::Bytes;
use opencv::{
    core::{Mat, Vector},
    imgcodecs::{imencode, IMWRITE_JPEG_QUALITY},
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use tracing::info;

/// Frame source reading from a local camera device
pub struct OpenCvSource {
    camera_id: u32,
    resolution: (u32, u32),
    frame_rate: u32,
    jpeg_quality: u8,
    capture: Option<VideoCapture>,
}

impl OpenCvSource {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            camera_id: config.camera_id,
            resolution: config.resolution,
            frame_rate: config.frame_rate,
            jpeg_quality: config.jpeg_quality,
            capture: None,
        }
    }
}

impl FrameSource for OpenCvSource {
    fn open(&mut self) -> Result<(), VisionError> {
        if self.capture.is_some() {
            return Ok(());
        }

        let mut capture = VideoCapture::new(self.camera_id as i32, CAP_ANY)
            .map_err(|e| VisionError::Camera(format!("Failed to open camera {}: {}", self.camera_id, e)))?;

        if !capture.is_opened()
            .map_err(|e| VisionError::Camera(format!("Camera {} not opened: {}", self.camera_id, e)))? {
            return Err(VisionError::Camera(format!("Camera {} failed to open", self.camera_id)));
        }

        capture.set(CAP_PROP_FRAME_WIDTH, self.resolution.0 as f64)
            .map_err(|e| VisionError::Camera(format!("Failed to set width: {}", e)))?;
        capture.set(CAP_PROP_FRAME_HEIGHT, self.resolution.1 as f64)
            .map_err(|e| VisionError::Camera(format!("Failed to set height: {}", e)))?;
        capture.set(CAP_PROP_FPS, self.frame_rate as f64)
            .map_err(|e| VisionError::Camera(format!("Failed to set FPS: {}", e)))?;

        info!("Camera {} opened at {}x{} @ {}fps",
            self.camera_id,
            self.resolution.0,
            self.resolution.1,
            self.frame_rate);

        self.capture = Some(capture);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Bytes, VisionError> {
        let capture = self.capture.as_mut()
            .ok_or_else(|| VisionError::Camera("Camera not initialized".to_string()))?;

        let mut frame = Mat::default();
        let grabbed = capture.read(&mut frame)
            .map_err(|e| VisionError::Camera(format!("Failed to read frame: {}", e)))?;
        if !grabbed || frame.empty() {
            return Err(VisionError::Camera("Camera returned an empty frame".to_string()));
        }

        let mut encoded = Vector::<u8>::new();
        let params = Vector::<i32>::from_slice(&[IMWRITE_JPEG_QUALITY, self.jpeg_quality as i32]);
        imencode(".jpg", &frame, &mut encoded, &params)?;

        Ok(Bytes::from(encoded.to_vec()))
    }

    fn close(&mut self) {
        self.capture = None;
    }
}
