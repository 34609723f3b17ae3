//! Error types for nameit-eye

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Camera access denied")]
    PermissionDenied,

    #[error("Model error: {0}")]
    Model(String),

    #[error("Model {name} unavailable: {reason}")]
    ModelUnavailable { name: String, reason: String },

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),

    #[error("OpenCV error: {0}")]
    OpenCv(String),
}

impl From<ort::Error> for VisionError {
    fn from(err: ort::Error) -> Self {
        VisionError::Ort(err.to_string())
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::OpenCv(err.message)
    }
}

impl From<toml::de::Error> for VisionError {
    fn from(err: toml::de::Error) -> Self {
        VisionError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::Camera("Test error".to_string());
        assert!(err.to_string().contains("Camera error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_model_unavailable_display() {
        let err = VisionError::ModelUnavailable {
            name: "VGG16".to_string(),
            reason: "file missing".to_string(),
        };
        assert_eq!(err.to_string(), "Model VGG16 unavailable: file missing");
    }

    #[test]
    fn test_vision_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let vision_err: VisionError = io_err.into();
        match vision_err {
            VisionError::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_vision_error_from_toml() {
        let parsed: Result<toml::Value, _> = toml::from_str("camera_id = ");
        let vision_err: VisionError = parsed.unwrap_err().into();
        assert!(matches!(vision_err, VisionError::Config(_)));
    }
}
