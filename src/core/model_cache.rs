//! Process-wide, lazily-initialized model state

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::core::errors::Result;
use crate::inference::{ModelLoader, Seq2SeqModel};
use crate::storage::artifacts;
use crate::storage::blob::BlobStore;

/// A model that finished loading
#[derive(Clone)]
pub struct LoadedModel {
    /// Shared model handle
    pub model: Arc<dyn Seq2SeqModel>,
    /// When loading finished
    pub loaded_at: DateTime<Utc>,
}

/// Downloads artifacts and loads the model at most once per process.
///
/// Concurrent callers of [`ModelCache::ensure_loaded`] share one initialization.
/// A failed attempt leaves the cache empty so the next call retries; files that
/// already made it to disk are not downloaded again.
pub struct ModelCache {
    store: Arc<dyn BlobStore>,
    loader: Arc<dyn ModelLoader>,
    model_dir: PathBuf,
    artifacts: Vec<String>,
    cell: OnceCell<LoadedModel>,
}

impl ModelCache {
    /// Cache that fills `model_dir` from `store` and loads with `loader`
    pub fn new(
        store: Arc<dyn BlobStore>,
        loader: Arc<dyn ModelLoader>,
        model_dir: PathBuf,
        artifacts: Vec<String>,
    ) -> Self {
        Self {
            store,
            loader,
            model_dir,
            artifacts,
            cell: OnceCell::new(),
        }
    }

    /// Return the cached model, initializing it first if needed
    pub async fn ensure_loaded(&self) -> Result<&LoadedModel> {
        self.cell.get_or_try_init(|| self.initialize()).await
    }

    /// Whether a model is loaded, without triggering a load
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Load time, if loaded
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.cell.get().map(|loaded| loaded.loaded_at)
    }

    /// Directory holding the artifacts
    pub fn model_dir(&self) -> &PathBuf {
        &self.model_dir
    }

    async fn initialize(&self) -> Result<LoadedModel> {
        info!("Initializing model from {}", self.model_dir.display());

        artifacts::fetch_all(self.store.as_ref(), &self.model_dir, &self.artifacts)
            .await
            .inspect_err(|e| warn!("Model artifact fetch failed: {}", e))?;

        let loader = Arc::clone(&self.loader);
        let dir = self.model_dir.clone();
        let model = tokio::task::spawn_blocking(move || loader.load(&dir))
            .await?
            .inspect_err(|e| warn!("Model load failed: {}", e))?;

        info!("Model and tokenizer loaded successfully");
        Ok(LoadedModel {
            model,
            loaded_at: Utc::now(),
        })
    }
}
