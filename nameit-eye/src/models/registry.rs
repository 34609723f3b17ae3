//! Models loaded once at startup

use crate::config::{ModelSpec, VisionConfig};
use crate::error::VisionError;
use crate::models::classifier::Classifier;
use crate::models::kind::ModelKind;
use crate::models::onnx::OnnxClassifier;
use crate::models::store::ModelStore;
use futures_util::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Load outcome of one model
#[derive(Clone)]
pub enum ModelState {
    Ready(Arc<dyn Classifier>),
    Failed(String),
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Ready(_) => f.write_str("Ready"),
            ModelState::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

/// A model identifier and its loaded handle
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub kind: ModelKind,
    pub state: ModelState,
}

/// Read-only set of models, in display order
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
}

impl ModelRegistry {
    /// Load every configured model. A model that fails to load is recorded as
    /// failed; the others are unaffected.
    pub async fn load(config: Arc<VisionConfig>) -> Self {
        let store = Arc::new(ModelStore::new(config.clone()));

        let loads = config.models.iter().cloned().map(|spec| {
            let store = store.clone();
            let intra_threads = config.intra_threads;
            async move {
                let kind = spec.kind;
                let state = match load_one(&store, spec, intra_threads).await {
                    Ok(classifier) => ModelState::Ready(classifier),
                    Err(e) => {
                        error!("Can't load model {}: {}", kind, e);
                        ModelState::Failed(e.to_string())
                    }
                };
                ModelEntry { kind, state }
            }
        });

        let registry = Self {
            entries: join_all(loads).await,
        };
        info!(
            "Model registry ready: {}/{} models loaded",
            registry.entries.iter().filter(|e| matches!(e.state, ModelState::Ready(_))).count(),
            registry.entries.len()
        );
        registry
    }

    /// Assemble a registry from already built classifiers
    pub fn from_entries(entries: Vec<(ModelKind, Result<Arc<dyn Classifier>, String>)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(kind, loaded)| ModelEntry {
                    kind,
                    state: match loaded {
                        Ok(classifier) => ModelState::Ready(classifier),
                        Err(reason) => ModelState::Failed(reason),
                    },
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn kinds(&self) -> impl Iterator<Item = ModelKind> + '_ {
        self.entries.iter().map(|e| e.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loaded handle for a model
    pub fn get(&self, kind: ModelKind) -> Result<Arc<dyn Classifier>, VisionError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.kind == kind)
            .ok_or_else(|| VisionError::ModelUnavailable {
                name: kind.name().to_string(),
                reason: "not configured".to_string(),
            })?;

        match &entry.state {
            ModelState::Ready(classifier) => Ok(classifier.clone()),
            ModelState::Failed(reason) => Err(VisionError::ModelUnavailable {
                name: kind.name().to_string(),
                reason: reason.clone(),
            }),
        }
    }

    pub fn is_ready(&self, kind: ModelKind) -> bool {
        self.get(kind).is_ok()
    }
}

async fn load_one(
    store: &ModelStore,
    spec: ModelSpec,
    intra_threads: usize,
) -> Result<Arc<dyn Classifier>, VisionError> {
    let files = store.resolve(&spec).await?;
    let classifier = tokio::task::spawn_blocking(move || {
        OnnxClassifier::load(&spec, &files.model, &files.labels, intra_threads)
    })
    .await
    .map_err(|e| VisionError::Model(format!("Model loading task failed: {}", e)))??;

    Ok(Arc::new(classifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::MockClassifier;
    use tempfile::TempDir;

    #[test]
    fn test_registry_lookup() {
        let registry = ModelRegistry::from_entries(vec![
            (ModelKind::ResNet50, Ok(Arc::new(MockClassifier::new()) as Arc<dyn Classifier>)),
            (ModelKind::Vgg16, Err("corrupt file".to_string())),
        ]);

        assert_eq!(registry.len(), 2);
        assert!(registry.is_ready(ModelKind::ResNet50));
        assert!(!registry.is_ready(ModelKind::Vgg16));

        match registry.get(ModelKind::Vgg16) {
            Err(VisionError::ModelUnavailable { name, reason }) => {
                assert_eq!(name, "VGG16");
                assert_eq!(reason, "corrupt file");
            }
            _ => panic!("Expected ModelUnavailable"),
        }

        assert!(registry.get(ModelKind::MobileNet).is_err());
        let kinds: Vec<_> = registry.kinds().collect();
        assert_eq!(kinds, vec![ModelKind::ResNet50, ModelKind::Vgg16]);
    }

    #[tokio::test]
    async fn test_load_marks_missing_models_failed() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = VisionConfig::default();
        config.model_path = temp_dir.path().to_path_buf();

        let registry = ModelRegistry::load(Arc::new(config)).await;
        assert_eq!(registry.len(), 4);
        for entry in registry.entries() {
            assert!(matches!(entry.state, ModelState::Failed(_)));
        }
    }
}
