//! Inference seam between the prediction runner and a model backend

use crate::error::VisionError;
use crate::prediction::ClassificationResult;
use image::DynamicImage;

/// An image classifier producing unordered observations
#[cfg_attr(test, mockall::automock)]
pub trait Classifier: Send + Sync {
    /// Run inference on a decoded image. The returned observations are not
    /// ranked.
    fn classify(&self, image: &DynamicImage) -> Result<Vec<ClassificationResult>, VisionError>;
}
