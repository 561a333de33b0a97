//! Model provider: owns the single active model handle
//!
//! Readers clone the `Arc` under a short read lock, so an in-flight
//! inference keeps a complete handle even while a retrain swaps in a new one.

use crate::error::{ServingError, ServingResult};
use crate::model::{Model, ModelHandle, ModelSpec};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info};

/// Source of the active model handle
pub trait ModelProvider: Send + Sync {
    /// Current handle, loading it first if needed
    fn acquire(&self) -> ServingResult<ModelHandle>;

    /// Swap in a new handle for all subsequent `acquire` calls
    fn replace(&self, model: ModelHandle);

    /// Number of handles installed so far (0 until the first load)
    fn generation(&self) -> u64;

    /// Whether a handle is currently held
    fn is_loaded(&self) -> bool;
}

/// Provider that lazily loads a model artifact from disk and caches it
pub struct ArtifactModelProvider {
    spec: ModelSpec,
    current: RwLock<Option<ModelHandle>>,
    generation: AtomicU64,
}

impl ArtifactModelProvider {
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            spec,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn cached(&self) -> Option<ModelHandle> {
        // Writers only ever assign a whole Option, so a poisoned lock still
        // holds a consistent value.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn load(&self) -> ServingResult<ModelHandle> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished loading while we waited
        if let Some(model) = current.as_ref() {
            return Ok(model.clone());
        }

        let loaded = self.spec.load().map_err(|e| {
            error!(
                path = %self.spec.path.display(),
                error = %format!("{:#}", e),
                "Model loading failed"
            );
            ServingError::model_load(&self.spec.path, &e)
        })?;

        let model: ModelHandle = Arc::from(loaded.model);
        *current = Some(model.clone());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        info!(
            path = %self.spec.path.display(),
            format = %loaded.format,
            backend = model.kind(),
            input_width = ?model.input_width(),
            checksum = %loaded.checksum,
            size_bytes = loaded.size_bytes,
            generation,
            "Model loaded"
        );

        Ok(model)
    }
}

impl ModelProvider for ArtifactModelProvider {
    fn acquire(&self) -> ServingResult<ModelHandle> {
        match self.cached() {
            Some(model) => Ok(model),
            None => self.load(),
        }
    }

    fn replace(&self, model: ModelHandle) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(model);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_loaded(&self) -> bool {
        self.cached().is_some()
    }
}

/// In-memory provider, for embedding a model built in code and for tests
pub struct StaticModelProvider {
    current: RwLock<ModelHandle>,
    generation: AtomicU64,
}

impl StaticModelProvider {
    pub fn new(model: impl Model + 'static) -> Self {
        Self::from_handle(Arc::new(model))
    }

    pub fn from_handle(model: ModelHandle) -> Self {
        Self {
            current: RwLock::new(model),
            generation: AtomicU64::new(1),
        }
    }
}

impl ModelProvider for StaticModelProvider {
    fn acquire(&self) -> ServingResult<ModelHandle> {
        Ok(self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn replace(&self, model: ModelHandle) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = model;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_loaded(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearModel;
    use ndarray::array;
    use tempfile::TempDir;

    fn write_model(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"weights": [[1.0], [1.0]], "bias": [0.0]}"#).unwrap();
        path
    }

    #[test]
    fn test_lazy_load_and_cache() {
        let temp_dir = TempDir::new().unwrap();
        let provider = ArtifactModelProvider::new(ModelSpec::new(write_model(&temp_dir)));

        assert!(!provider.is_loaded());
        assert_eq!(provider.generation(), 0);

        let first = provider.acquire().unwrap();
        let second = provider.acquire().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(provider.is_loaded());
        assert_eq!(provider.generation(), 1);
    }

    #[test]
    fn test_missing_artifact_is_model_load_error() {
        let provider = ArtifactModelProvider::new(ModelSpec::new("/nonexistent/model.json"));
        let err = provider.acquire().err().unwrap();
        assert!(matches!(err, ServingError::ModelLoad { .. }));
        assert!(!provider.is_loaded());
    }

    #[test]
    fn test_failed_load_is_retried() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.json");
        let provider = ArtifactModelProvider::new(ModelSpec::new(&path));

        assert!(provider.acquire().is_err());

        std::fs::write(&path, r#"{"weights": [[2.0]], "bias": [0.0]}"#).unwrap();
        let model = provider.acquire().unwrap();
        assert_eq!(model.input_width(), Some(1));
    }

    #[test]
    fn test_replace_swaps_handle() {
        let temp_dir = TempDir::new().unwrap();
        let provider = ArtifactModelProvider::new(ModelSpec::new(write_model(&temp_dir)));
        let old = provider.acquire().unwrap();

        let new_model = LinearModel::new(array![[3.0], [3.0]], array![1.0]).unwrap();
        provider.replace(Arc::new(new_model));

        let current = provider.acquire().unwrap();
        assert!(!Arc::ptr_eq(&old, &current));
        assert_eq!(provider.generation(), 2);

        // The old handle stays usable for whoever still holds it
        let out = old.predict(array![[1.0, 1.0]].view()).unwrap();
        assert!((out[[0, 0]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticModelProvider::new(LinearModel::zeros(3, 1).unwrap());
        assert!(provider.is_loaded());
        assert_eq!(provider.generation(), 1);

        provider.replace(Arc::new(LinearModel::zeros(2, 1).unwrap()));
        assert_eq!(provider.acquire().unwrap().input_width(), Some(2));
        assert_eq!(provider.generation(), 2);
    }
}
