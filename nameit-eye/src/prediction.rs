//! Running a captured image through one classifier and ranking the output

use crate::camera::CapturedImage;
use crate::error::VisionError;
use crate::models::Classifier;
use image::DynamicImage;
use std::cmp::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Number of ranked results kept for display
pub const DISPLAYED_RESULTS: usize = 2;

/// One (label, confidence) observation
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Ranked results of one model on one image
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// At most `DISPLAYED_RESULTS` entries, best first
    pub results: Vec<ClassificationResult>,
    /// Wall-clock time spent in inference
    pub latency: Duration,
}

/// Sort observations by descending confidence and keep the first `k`.
///
/// The sort is stable: observations with equal confidence stay in the order
/// the backend produced them. Non-finite confidences are dropped.
pub fn rank_top(mut observations: Vec<ClassificationResult>, k: usize) -> Vec<ClassificationResult> {
    let before = observations.len();
    observations.retain(|o| o.confidence.is_finite());
    if observations.len() != before {
        debug!("Dropped {} non-finite observations", before - observations.len());
    }

    observations.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    observations.truncate(k);
    observations
}

/// Decode the encoded capture into pixels
pub fn decode(image: &CapturedImage) -> Result<DynamicImage, VisionError> {
    image::load_from_memory(&image.data).map_err(|e| {
        VisionError::Processing(format!("Could not decode captured image: {}", e))
    })
}

/// Runs inference for a single model and ranks the output
#[derive(Debug, Clone)]
pub struct PredictionRunner {
    top_k: usize,
}

impl Default for PredictionRunner {
    fn default() -> Self {
        Self {
            top_k: DISPLAYED_RESULTS,
        }
    }
}

impl PredictionRunner {
    /// Decode, classify and rank. Blocking.
    pub fn predict(
        &self,
        image: &CapturedImage,
        model: &dyn Classifier,
    ) -> Result<Prediction, VisionError> {
        let pixels = decode(image).map_err(|e| {
            warn!("{}", e);
            e
        })?;

        let started = Instant::now();
        let observations = model.classify(&pixels)?;
        let latency = started.elapsed();

        if observations.is_empty() {
            warn!("Model did not yield any results");
        }

        let results = rank_top(observations, self.top_k);
        for result in &results {
            debug!("{}: {:.3}", result.label, result.confidence * 100.0);
        }

        Ok(Prediction { results, latency })
    }
}
