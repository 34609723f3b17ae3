//! Configuration for nameit-eye

use crate::error::VisionError;
use crate::models::ModelKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Memory layout of the input tensor a model expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// [1, 3, H, W]
    Nchw,
    /// [1, H, W, 3]
    Nhwc,
}

/// Pixel normalization applied before inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// RGB scaled to [0, 1] then ImageNet mean/std
    ImageNet,
    /// RGB scaled to [-1, 1]
    Symmetric,
    /// BGR with ImageNet channel means subtracted, no scaling
    Caffe,
}

/// What the first output tensor of a model holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelOutput {
    /// Raw scores, softmax is applied after inference
    Logits,
    /// Already normalized class probabilities
    Probabilities,
}

/// Where a model lives and how to feed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub kind: ModelKind,
    /// ONNX file name inside the model directory
    pub model_file: String,
    /// Label file name inside the model directory (`.txt` or `.json`)
    pub labels_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels_sha256: Option<String>,
    /// Square input edge in pixels
    pub input_size: u32,
    pub layout: TensorLayout,
    pub normalization: Normalization,
    pub output: ModelOutput,
}

impl ModelSpec {
    /// Stock settings for one of the four families
    pub fn default_for(kind: ModelKind) -> Self {
        let (layout, normalization, output) = match kind {
            ModelKind::ResNet50 | ModelKind::Vgg16 | ModelKind::MobileNet => {
                (TensorLayout::Nchw, Normalization::ImageNet, ModelOutput::Logits)
            }
            ModelKind::NasNetMobile => {
                (TensorLayout::Nhwc, Normalization::Symmetric, ModelOutput::Probabilities)
            }
        };

        Self {
            kind,
            model_file: format!("{}.onnx", kind.file_stem()),
            labels_file: format!("{}.labels.txt", kind.file_stem()),
            model_url: None,
            model_sha256: None,
            labels_url: None,
            labels_sha256: None,
            input_size: 224,
            layout,
            normalization,
            output,
        }
    }
}

/// Vision system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// USB camera device index (0, 1, 2, etc.)
    pub camera_id: u32,
    /// Target preview frame rate (frames per second)
    pub frame_rate: u32,
    /// Camera resolution (width, height)
    pub resolution: (u32, u32),
    /// JPEG quality used when encoding still captures
    pub jpeg_quality: u8,
    /// Upper bound for a single still capture
    pub capture_timeout_ms: u64,
    /// Intra-op threads per inference session
    pub intra_threads: usize,
    /// Directory holding model and label files
    pub model_path: PathBuf,
    /// Models to load, in display order
    pub models: Vec<ModelSpec>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        let model_path = dirs::home_dir()
            .map(|mut p| {
                p.push(".nameit");
                p.push("models");
                p
            })
            .unwrap_or_else(|| PathBuf::from("./models"));

        Self {
            camera_id: 0,
            frame_rate: 30,
            resolution: (1280, 720),
            jpeg_quality: 90,
            capture_timeout_ms: 5_000,
            intra_threads: 2,
            model_path,
            models: ModelKind::ALL.iter().map(|k| ModelSpec::default_for(*k)).collect(),
        }
    }
}

impl VisionConfig {
    /// Load configuration from a TOML file; missing keys take defaults
    pub fn from_file(path: &Path) -> Result<Self, VisionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VisionError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: VisionConfig = toml::from_str(&content)?;
        config.validate().map_err(VisionError::Config)?;
        Ok(config)
    }

    /// Look up the settings for one model kind
    pub fn model(&self, kind: ModelKind) -> Option<&ModelSpec> {
        self.models.iter().find(|spec| spec.kind == kind)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err("Frame rate must be between 1 and 120".to_string());
        }

        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err("Resolution must be non-zero".to_string());
        }

        if self.resolution.0 > 7680 || self.resolution.1 > 4320 {
            return Err("Resolution too large (max 8K)".to_string());
        }

        if self.camera_id > 100 {
            return Err("Camera ID too large (max 100)".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }

        if self.capture_timeout_ms == 0 {
            return Err("Capture timeout must be non-zero".to_string());
        }

        if self.intra_threads == 0 || self.intra_threads > 64 {
            return Err("Intra-op threads must be between 1 and 64".to_string());
        }

        if self.models.is_empty() {
            return Err("At least one model must be configured".to_string());
        }

        let mut seen = HashSet::new();
        for spec in &self.models {
            if !seen.insert(spec.kind) {
                return Err(format!("Model {} configured more than once", spec.kind));
            }
            if spec.input_size < 32 || spec.input_size > 1024 {
                return Err(format!("Input size for {} must be between 32 and 1024", spec.kind));
            }
            if spec.model_file.is_empty() || spec.labels_file.is_empty() {
                return Err(format!("Model and label file names for {} must be set", spec.kind));
            }
        }

        Ok(())
    }
}
