//! nameit-eye: photo classification with several ImageNet models side by side
//!
//! A camera preview is frozen on tap, the still is handed to every configured
//! classifier in parallel, and each model's two best guesses are rendered in
//! its own region as soon as that model finishes. Tapping again resumes the
//! preview.

pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod prediction;
pub mod presenter;

pub use camera::{CameraManager, CapturedImage, FrameSource, PreviewStatus, ReplaySource};
pub use config::{ModelSpec, VisionConfig};
pub use controller::{CapturePhase, ScreenState, UiEvent, View, ViewController};
pub use error::VisionError;
pub use models::{Classifier, ModelKind, ModelRegistry};
pub use prediction::{ClassificationResult, Prediction, PredictionRunner};
pub use presenter::Region;
