//! Marian encoder-decoder backend built on candle

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::marian::{self, MTModel};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::core::config::GenerationSettings;
use crate::core::errors::{Result, TranslationError};
use crate::inference::beam::BeamSearch;
use crate::inference::{ModelLoader, Seq2SeqModel};

fn load_err(e: impl std::fmt::Display) -> TranslationError {
    TranslationError::ModelLoadError {
        message: e.to_string(),
    }
}

fn gen_err(e: impl std::fmt::Display) -> TranslationError {
    TranslationError::GenerationError {
        message: e.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TokenIds {
    One(u32),
    Many(Vec<u32>),
}

impl TokenIds {
    fn first(&self) -> Option<u32> {
        match self {
            TokenIds::One(id) => Some(*id),
            TokenIds::Many(ids) => ids.first().copied(),
        }
    }
}

/// The parts of `generation_config.json` that affect decoding
#[derive(Debug, Clone, Default, Deserialize)]
struct GenerationConfigFile {
    decoder_start_token_id: Option<u32>,
    eos_token_id: Option<TokenIds>,
    forced_bos_token_id: Option<u32>,
    forced_eos_token_id: Option<TokenIds>,
    #[serde(default)]
    bad_words_ids: Vec<Vec<u32>>,
}

impl GenerationConfigFile {
    fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read(path).map_err(load_err)?;
        serde_json::from_slice(&data).map_err(load_err)
    }

    /// Fill fields this file leaves unset from the model's own `config.json`
    fn or(self, model: Self) -> Self {
        Self {
            decoder_start_token_id: self.decoder_start_token_id.or(model.decoder_start_token_id),
            eos_token_id: self.eos_token_id.or(model.eos_token_id),
            forced_bos_token_id: self.forced_bos_token_id.or(model.forced_bos_token_id),
            forced_eos_token_id: self.forced_eos_token_id.or(model.forced_eos_token_id),
            bad_words_ids: if self.bad_words_ids.is_empty() {
                model.bad_words_ids
            } else {
                self.bad_words_ids
            },
        }
    }
}

/// Loads a Marian checkpoint (`config.json`, `model.safetensors`, `tokenizer.json`)
#[derive(Debug, Clone)]
pub struct MarianLoader {
    settings: GenerationSettings,
}

impl MarianLoader {
    /// Loader applying the given beam settings
    pub fn new(settings: GenerationSettings) -> Self {
        Self { settings }
    }
}

impl ModelLoader for MarianLoader {
    fn load(&self, dir: &Path) -> Result<Arc<dyn Seq2SeqModel>> {
        let device = Device::Cpu;

        let config_data = std::fs::read(dir.join("config.json")).map_err(load_err)?;
        let config: marian::Config = serde_json::from_slice(&config_data).map_err(load_err)?;
        let model_defaults: GenerationConfigFile =
            serde_json::from_slice(&config_data).map_err(load_err)?;
        let generation =
            GenerationConfigFile::read(&dir.join("generation_config.json"))?.or(model_defaults);

        let mut tokenizer = Tokenizer::from_file(dir.join("tokenizer.json")).map_err(load_err)?;
        let pad_token = tokenizer
            .id_to_token(config.pad_token_id)
            .unwrap_or_else(|| "<pad>".to_string());
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_position_embeddings,
                ..Default::default()
            }))
            .map_err(load_err)?;
        tokenizer.with_padding(Some(PaddingParams {
            pad_id: config.pad_token_id,
            pad_token,
            ..Default::default()
        }));

        let tensors = candle_core::safetensors::load(dir.join("model.safetensors"), &device)
            .map_err(load_err)?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let model = MTModel::new(&config, vb).map_err(load_err)?;

        let mut suppressed: Vec<u32> = generation
            .bad_words_ids
            .iter()
            .filter(|ids| ids.len() == 1)
            .map(|ids| ids[0])
            .collect();
        if !suppressed.contains(&config.pad_token_id) {
            suppressed.push(config.pad_token_id);
        }

        let search = BeamSearch {
            num_beams: self.settings.num_beams,
            max_length: self.settings.max_length,
            length_penalty: self.settings.length_penalty,
            decoder_start_token_id: generation
                .decoder_start_token_id
                .unwrap_or(config.decoder_start_token_id),
            eos_token_id: generation
                .eos_token_id
                .and_then(|ids| ids.first())
                .unwrap_or(config.eos_token_id),
            suppressed,
            forced_bos_token_id: generation.forced_bos_token_id,
            forced_eos_token_id: generation.forced_eos_token_id.and_then(|ids| ids.first()),
        };

        info!(
            "Loaded Marian model from {} (vocab {}, {} beams)",
            dir.display(),
            config.vocab_size,
            search.num_beams
        );

        Ok(Arc::new(MarianTranslator {
            model: Mutex::new(model),
            tokenizer,
            search,
            device,
        }))
    }
}

/// A loaded Marian model ready to translate batches.
///
/// The decoder keeps internal KV state, so generation is serialized
/// through a mutex.
pub struct MarianTranslator {
    model: Mutex<MTModel>,
    tokenizer: Tokenizer,
    search: BeamSearch,
    device: Device,
}

fn encode(model: &mut MTModel, ids: &[u32], device: &Device) -> candle_core::Result<Tensor> {
    model.reset_kv_cache();
    let input = Tensor::new(ids, device)?.unsqueeze(0)?;
    model.encoder().forward(&input, 0)
}

/// Next-token logits for every live beam; the full prefix is re-run each step
fn decode_step(
    model: &mut MTModel,
    sequences: &[Vec<u32>],
    encoder_xs: &Tensor,
    device: &Device,
) -> candle_core::Result<Vec<Vec<f32>>> {
    let beams = sequences.len();
    let len = sequences.first().map(Vec::len).unwrap_or(0);
    let flat: Vec<u32> = sequences.iter().flatten().copied().collect();

    let input = Tensor::from_vec(flat, (beams, len), device)?;
    let encoder_xs = encoder_xs.repeat((beams, 1, 1))?;

    model.reset_kv_cache();
    let logits = model.decode(&input, &encoder_xs, 0)?;
    logits
        .narrow(1, len - 1, 1)?
        .squeeze(1)?
        .to_dtype(DType::F32)?
        .to_vec2::<f32>()
}

impl Seq2SeqModel for MarianTranslator {
    fn generate(&self, units: &[String]) -> Result<Vec<String>> {
        let inputs: Vec<&str> = units.iter().map(String::as_str).collect();
        let encodings = self.tokenizer.encode_batch(inputs, true).map_err(gen_err)?;

        let mut model = self
            .model
            .lock()
            .map_err(|_| gen_err("model mutex poisoned"))?;

        let mut outputs = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            let real_len = encoding.get_attention_mask().iter().filter(|&&m| m != 0).count();
            let ids = &encoding.get_ids()[..real_len];
            if ids.is_empty() {
                outputs.push(String::new());
                continue;
            }

            let encoder_xs = encode(&mut model, ids, &self.device).map_err(gen_err)?;
            let tokens = self.search.run(|sequences| {
                decode_step(&mut model, sequences, &encoder_xs, &self.device).map_err(gen_err)
            })?;

            debug!("Generated {} tokens from {} source tokens", tokens.len(), ids.len());
            outputs.push(self.tokenizer.decode(&tokens, true).map_err(gen_err)?);
        }

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_parsing() {
        let parsed: GenerationConfigFile = serde_json::from_str(
            r#"{"bad_words_ids": [[58100]], "decoder_start_token_id": 58100,
                "eos_token_id": 0, "max_length": 512, "num_beams": 4}"#,
        )
        .unwrap();
        assert_eq!(parsed.decoder_start_token_id, Some(58100));
        assert_eq!(parsed.eos_token_id.and_then(|ids| ids.first()), Some(0));
        assert_eq!(parsed.bad_words_ids, vec![vec![58100]]);

        let many: GenerationConfigFile = serde_json::from_str(r#"{"eos_token_id": [2, 3]}"#).unwrap();
        assert_eq!(many.eos_token_id.and_then(|ids| ids.first()), Some(2));
    }

    #[test]
    fn test_forced_tokens_fall_back_to_model_config() {
        let generation: GenerationConfigFile =
            serde_json::from_str(r#"{"forced_bos_token_id": null, "num_beams": 4}"#).unwrap();
        let model: GenerationConfigFile = serde_json::from_str(
            r#"{"forced_bos_token_id": 250004, "forced_eos_token_id": 2,
                "eos_token_id": 2, "d_model": 1024}"#,
        )
        .unwrap();

        let merged = generation.or(model);
        assert_eq!(merged.forced_bos_token_id, Some(250004));
        assert_eq!(merged.forced_eos_token_id.and_then(|ids| ids.first()), Some(2));
        assert_eq!(merged.eos_token_id.and_then(|ids| ids.first()), Some(2));

        let own: GenerationConfigFile =
            serde_json::from_str(r#"{"forced_bos_token_id": 7}"#).unwrap();
        assert_eq!(own.or(GenerationConfigFile::default()).forced_bos_token_id, Some(7));
    }

    #[test]
    fn test_missing_generation_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let parsed = GenerationConfigFile::read(&dir.path().join("generation_config.json")).unwrap();
        assert!(parsed.decoder_start_token_id.is_none());
        assert!(parsed.bad_words_ids.is_empty());
    }

    #[test]
    fn test_load_from_empty_dir_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = MarianLoader::new(GenerationSettings::default()).load(dir.path());
        assert!(matches!(result, Err(TranslationError::ModelLoadError { .. })));
    }
}
