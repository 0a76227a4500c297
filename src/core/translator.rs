//! Translation request handling: segment, invoke the model, reassemble

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::model_cache::{LoadedModel, ModelCache};
use crate::core::models::{SegmentBatch, TranslationRequest, TranslationResult};
use crate::inference::{MarianLoader, ModelLoader, Seq2SeqModel};
use crate::processors::segmenter::Segmenter;
use crate::storage::blob::{AzureBlobStore, BlobStore};

/// Translation front end shared by the HTTP server and the CLI
#[derive(Clone)]
pub struct AsyncTranslator {
    segmenter: Segmenter,
    cache: Arc<ModelCache>,
}

impl AsyncTranslator {
    /// Create a translator around an existing model cache
    pub fn new(segmenter: Segmenter, cache: Arc<ModelCache>) -> Self {
        Self { segmenter, cache }
    }

    /// Wire up Azure storage and the Marian backend from configuration
    pub fn from_config(config: &TranslatorConfig) -> Result<Self> {
        let store: Arc<dyn BlobStore> = Arc::new(AzureBlobStore::new(&config.storage)?);
        let loader: Arc<dyn ModelLoader> = Arc::new(MarianLoader::new(config.generation.clone()));
        let cache = ModelCache::new(
            store,
            loader,
            config.model_dir.clone(),
            config.artifacts.clone(),
        );

        Ok(Self::new(
            Segmenter::new(config.sentence_language),
            Arc::new(cache),
        ))
    }

    /// Download and load the model now instead of on the first request
    pub async fn load_model(&self) -> Result<&LoadedModel> {
        self.cache.ensure_loaded().await
    }

    /// Underlying model cache
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Translate a single request
    pub async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        let started = Instant::now();
        let plan = self.segmenter.plan(&request.text);

        if plan.is_empty() {
            debug!("Nothing to translate");
            return Ok(TranslationResult {
                translated_text: String::new(),
                strategy: plan.strategy,
                unit_count: 0,
            });
        }

        let model = Arc::clone(&self.cache.ensure_loaded().await?.model);

        let mut outputs = Vec::with_capacity(plan.batches.len());
        for batch in &plan.batches {
            outputs.push(run_batch(Arc::clone(&model), batch.clone()).await?);
        }

        let translated_text = plan.reassemble(outputs)?;

        info!(
            "Translated {} units ({}) in {:?}",
            plan.unit_count(),
            plan.strategy,
            started.elapsed()
        );

        Ok(TranslationResult {
            translated_text,
            strategy: plan.strategy,
            unit_count: plan.unit_count(),
        })
    }
}

/// Run one batch on the blocking pool and check the model kept every unit
async fn run_batch(model: Arc<dyn Seq2SeqModel>, batch: SegmentBatch) -> Result<Vec<String>> {
    let expected = batch.len();
    let translated = tokio::task::spawn_blocking(move || model.generate(&batch.units)).await??;

    if translated.len() != expected {
        return Err(TranslationError::UnitCountMismatch {
            expected,
            actual: translated.len(),
        });
    }

    Ok(translated)
}
