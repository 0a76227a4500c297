//! In-memory fakes shared by unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::errors::{Result, TranslationError};
use crate::core::model_cache::ModelCache;
use crate::core::models::SentenceLanguage;
use crate::core::translator::AsyncTranslator;
use crate::inference::{ModelLoader, Seq2SeqModel};
use crate::processors::segmenter::Segmenter;
use crate::storage::blob::BlobStore;

/// Blob store that serves synthetic contents and counts fetches per blob
#[derive(Default)]
pub struct CountingStore {
    counts: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    fail_on: Option<String>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn failing_on(name: &str) -> Self {
        Self {
            fail_on: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn fetches(&self, name: &str) -> usize {
        self.counts.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl BlobStore for CountingStore {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        *self.counts.lock().unwrap().entry(name.to_string()).or_default() += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_on.as_deref() == Some(name) {
            return Err(TranslationError::StorageError {
                blob: name.to_string(),
                status: Some(404),
                message: "BlobNotFound".to_string(),
            });
        }

        Ok(format!("contents of {}", name).into_bytes())
    }
}

/// Model that wraps every unit in angle brackets and records each invocation
#[derive(Default)]
pub struct RecordingModel {
    calls: Mutex<Vec<Vec<String>>>,
    drop_last: bool,
}

impl RecordingModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broken model that loses the last unit of every batch
    pub fn dropping_last() -> Self {
        Self {
            drop_last: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl Seq2SeqModel for RecordingModel {
    fn generate(&self, units: &[String]) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push(units.to_vec());

        let mut out: Vec<String> = units.iter().map(|u| format!("<{}>", u)).collect();
        if self.drop_last {
            out.pop();
        }
        Ok(out)
    }
}

/// Loader handing out a shared [`RecordingModel`], optionally failing first
pub struct RecordingLoader {
    model: Arc<RecordingModel>,
    loads: AtomicUsize,
    fail_first: usize,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::with_model(Arc::new(RecordingModel::new()))
    }

    pub fn with_model(model: Arc<RecordingModel>) -> Self {
        Self {
            model,
            loads: AtomicUsize::new(0),
            fail_first: 0,
        }
    }

    pub fn failing_first(attempts: usize) -> Self {
        Self {
            fail_first: attempts,
            ..Self::new()
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn model(&self) -> Arc<RecordingModel> {
        Arc::clone(&self.model)
    }
}

impl ModelLoader for RecordingLoader {
    fn load(&self, _dir: &Path) -> Result<Arc<dyn Seq2SeqModel>> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first {
            return Err(TranslationError::ModelLoadError {
                message: "corrupted weights".to_string(),
            });
        }
        Ok(self.model.clone())
    }
}

/// Translator over the fakes, with a throwaway model directory
pub fn translator(
    store: Arc<CountingStore>,
    loader: Arc<RecordingLoader>,
) -> (AsyncTranslator, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let cache = ModelCache::new(
        store,
        loader,
        dir.path().to_path_buf(),
        vec!["config.json".to_string()],
    );
    let translator = AsyncTranslator::new(Segmenter::new(SentenceLanguage::English), Arc::new(cache));
    (translator, dir)
}
