//! Model files on disk, with optional download

use crate::config::{ModelSpec, VisionConfig};
use crate::error::VisionError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MAX_MODEL_SIZE: usize = 2_000_000_000; // 2GB max
const MIN_FILE_SIZE: usize = 16;
const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

/// Paths of one model's files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model: PathBuf,
    pub labels: PathBuf,
}

/// Resolves model and label files inside the configured model directory
pub struct ModelStore {
    config: Arc<VisionConfig>,
}

impl ModelStore {
    pub fn new(config: Arc<VisionConfig>) -> Self {
        Self { config }
    }

    /// Ensure model directory exists
    pub fn ensure_model_dir(&self) -> Result<PathBuf, VisionError> {
        let model_path = &self.config.model_path;
        if !model_path.exists() {
            fs::create_dir_all(model_path)?;
            info!("Created model directory: {:?}", model_path);
        }
        Ok(model_path.clone())
    }

    /// Paths for a model's files, without touching the network
    pub fn locate(&self, spec: &ModelSpec) -> Result<ModelFiles, VisionError> {
        Ok(ModelFiles {
            model: self.checked_path(&spec.model_file)?,
            labels: self.checked_path(&spec.labels_file)?,
        })
    }

    /// Paths for a model's files, downloading any that are missing and have a
    /// configured URL
    pub async fn resolve(&self, spec: &ModelSpec) -> Result<ModelFiles, VisionError> {
        let files = self.locate(spec)?;

        for (path, url, checksum) in [
            (&files.labels, spec.labels_url.as_deref(), spec.labels_sha256.as_deref()),
            (&files.model, spec.model_url.as_deref(), spec.model_sha256.as_deref()),
        ] {
            if path.exists() {
                continue;
            }
            match url {
                Some(url) => {
                    self.ensure_model_dir()?;
                    download(url, path, checksum.unwrap_or("")).await?;
                }
                None => {
                    return Err(VisionError::Model(format!(
                        "{} not found at {:?} and no download URL configured",
                        spec.kind, path
                    )));
                }
            }
        }

        Ok(files)
    }

    fn checked_path(&self, file_name: &str) -> Result<PathBuf, VisionError> {
        validate_file_name(file_name)?;
        let path = self.config.model_path.join(file_name);
        if !path.starts_with(&self.config.model_path) {
            return Err(VisionError::Model("Path traversal detected".to_string()));
        }
        Ok(path)
    }
}

fn validate_file_name(file_name: &str) -> Result<(), VisionError> {
    if file_name.is_empty() || file_name.len() > 255 {
        return Err(VisionError::Model("Invalid model file name".to_string()));
    }
    if file_name.contains("..") || file_name.contains('/') || file_name.contains('\\') {
        return Err(VisionError::Model("Model file name contains invalid characters".to_string()));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<(), VisionError> {
    if url.is_empty() || url.len() > 2048 {
        return Err(VisionError::Model("Invalid URL".to_string()));
    }
    if !url.starts_with("https://") {
        return Err(VisionError::Model("Only HTTPS URLs are allowed for model downloads".to_string()));
    }
    Ok(())
}

/// SHA-256 of `bytes` must equal `checksum` (hex) when one is given
fn verify_checksum(bytes: &[u8], checksum: &str) -> Result<(), VisionError> {
    if checksum.is_empty() {
        return Ok(());
    }
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let computed = hex::encode(hasher.finalize());
    if !computed.eq_ignore_ascii_case(checksum) {
        return Err(VisionError::Model(format!(
            "Checksum mismatch: expected {}, got {}",
            checksum, computed
        )));
    }
    Ok(())
}

async fn download(url: &str, dest: &Path, checksum: &str) -> Result<(), VisionError> {
    validate_url(url)?;
    info!("Downloading {} to {:?}", url, dest);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .build()?;

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(VisionError::Model(format!("Failed to download {}: HTTP {}", url, response.status())));
    }

    if let Some(content_length) = response.content_length() {
        if content_length > MAX_MODEL_SIZE as u64 {
            return Err(VisionError::Model(format!(
                "File too large: {} bytes (max {} bytes)",
                content_length, MAX_MODEL_SIZE
            )));
        }
    }

    let bytes = response.bytes().await?;
    if bytes.len() > MAX_MODEL_SIZE {
        return Err(VisionError::Model(format!("Downloaded file too large: {} bytes", bytes.len())));
    }
    if bytes.len() < MIN_FILE_SIZE {
        return Err(VisionError::Model("Downloaded file too small, likely corrupted".to_string()));
    }

    if checksum.is_empty() {
        warn!("No checksum configured for {}, skipping verification", url);
    }
    verify_checksum(&bytes, checksum)?;

    // Write to a temp file first so a failed write never leaves a partial file
    let temp_path = dest.with_extension("tmp");
    fs::write(&temp_path, &bytes)?;
    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        VisionError::Io(e)
    })?;

    info!("Saved {} bytes to {:?}", bytes.len(), dest);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelKind;
    use tempfile::TempDir;

    fn store_in(dir: &Path) -> ModelStore {
        let mut config = VisionConfig::default();
        config.model_path = dir.to_path_buf();
        ModelStore::new(Arc::new(config))
    }

    #[test]
    fn test_ensure_model_dir_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir.path().join("nested"));
        assert!(store.ensure_model_dir().is_ok());
        assert!(store.ensure_model_dir().is_ok());
    }

    #[test]
    fn test_locate_rejects_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(temp_dir.path());

        let mut spec = ModelSpec::default_for(ModelKind::ResNet50);
        spec.model_file = "../evil.onnx".to_string();
        assert!(store.locate(&spec).is_err());

        spec.model_file = "sub/model.onnx".to_string();
        assert!(store.locate(&spec).is_err());

        spec.model_file = String::new();
        assert!(store.locate(&spec).is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("").is_err());
        assert!(validate_url("http://example.com/model.onnx").is_err());
        assert!(validate_url("ftp://example.com/model.onnx").is_err());
        assert!(validate_url("https://example.com/model.onnx").is_ok());
    }

    #[test]
    fn test_verify_checksum() {
        // sha256("abc")
        let abc = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert!(verify_checksum(b"abc", abc).is_ok());
        assert!(verify_checksum(b"abc", &abc.to_uppercase()).is_ok());
        assert!(verify_checksum(b"abd", abc).is_err());
        assert!(verify_checksum(b"anything", "").is_ok());
    }

    #[tokio::test]
    async fn test_resolve_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(temp_dir.path());
        let spec = ModelSpec::default_for(ModelKind::Vgg16);
        std::fs::write(temp_dir.path().join(&spec.model_file), b"onnx").unwrap();
        std::fs::write(temp_dir.path().join(&spec.labels_file), b"tabby").unwrap();

        let files = store.resolve(&spec).await.unwrap();
        assert_eq!(files.model, temp_dir.path().join("vgg16.onnx"));
        assert_eq!(files.labels, temp_dir.path().join("vgg16.labels.txt"));
    }

    #[tokio::test]
    async fn test_resolve_missing_without_url() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(temp_dir.path());
        let spec = ModelSpec::default_for(ModelKind::MobileNet);

        let err = store.resolve(&spec).await.unwrap_err();
        assert!(err.to_string().contains("MobileNet"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_plain_http_url() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(temp_dir.path());
        let mut spec = ModelSpec::default_for(ModelKind::MobileNet);
        spec.labels_url = Some("http://example.com/labels.txt".to_string());

        let err = store.resolve(&spec).await.unwrap_err();
        assert!(err.to_string().contains("HTTPS"));
    }
}
