//! Classification models: identifiers, files, loading and inference

pub mod classifier;
pub mod kind;
pub mod labels;
pub mod onnx;
pub mod registry;
pub mod store;

pub use classifier::Classifier;
pub use kind::{LabelStyle, ModelKind};
pub use onnx::OnnxClassifier;
pub use registry::{ModelEntry, ModelRegistry, ModelState};
pub use store::{ModelFiles, ModelStore};
