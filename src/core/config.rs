//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::core::models::SentenceLanguage;

/// Model files fetched from blob storage before the model is loaded
pub const DEFAULT_ARTIFACTS: &[&str] = &[
    "config.json",
    "generation_config.json",
    "model.safetensors",
    "sentencepiece.bpe.model",
    "special_tokens_map.json",
    "tokenizer_config.json",
    "tokenizer.json",
];

/// Beam search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Beam width
    pub num_beams: usize,
    /// Upper bound on generated tokens, decoder start token included
    pub max_length: usize,
    /// Length penalty exponent
    pub length_penalty: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            num_beams: 4,
            max_length: 1024,
            length_penalty: 1.0,
        }
    }
}

/// Where the model artifacts live in Azure Blob Storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage account name
    pub account_name: String,
    /// Base64 account key for SharedKey auth
    pub account_key: Option<String>,
    /// SAS token, with or without the leading `?`
    pub sas_token: Option<String>,
    /// Blob service endpoint, e.g. an Azurite emulator URL
    pub endpoint: Option<String>,
    /// Container holding the model
    pub container: String,
    /// Folder prefix inside the container
    pub blob_folder: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            account_name: String::new(),
            account_key: None,
            sas_token: None,
            endpoint: None,
            container: "dsi-nlp-models".to_string(),
            blob_folder: "alignment_model".to_string(),
            timeout_ms: 300_000,
        }
    }
}

impl StorageConfig {
    /// Apply the fields of an Azure storage connection string.
    ///
    /// Recognises `AccountName`, `AccountKey`, `BlobEndpoint`,
    /// `SharedAccessSignature`, `DefaultEndpointsProtocol` and `EndpointSuffix`.
    pub fn apply_connection_string(&mut self, connection_string: &str) -> anyhow::Result<()> {
        let mut protocol = "https".to_string();
        let mut suffix = None;

        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("malformed connection string segment: {}", part))?;

            match key {
                "AccountName" => self.account_name = value.to_string(),
                "AccountKey" => self.account_key = Some(value.to_string()),
                "BlobEndpoint" => self.endpoint = Some(value.trim_end_matches('/').to_string()),
                "SharedAccessSignature" => self.sas_token = Some(value.to_string()),
                "DefaultEndpointsProtocol" => protocol = value.to_string(),
                "EndpointSuffix" => suffix = Some(value.to_string()),
                _ => {}
            }
        }

        if self.endpoint.is_none() && !self.account_name.is_empty() {
            if let Some(suffix) = suffix {
                self.endpoint = Some(format!("{}://{}.blob.{}", protocol, self.account_name, suffix));
            }
        }

        Ok(())
    }

    /// Blob service base URL
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", self.account_name))
    }
}

/// Configuration for the translation service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Local directory for downloaded artifacts
    pub model_dir: PathBuf,
    /// Artifact file names to fetch
    pub artifacts: Vec<String>,
    /// Blob storage settings
    pub storage: StorageConfig,
    /// Decoding settings
    pub generation: GenerationSettings,
    /// Language used for sentence splitting
    pub sentence_language: SentenceLanguage,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_dir: PathBuf::from("./alignment_model_local"),
            artifacts: DEFAULT_ARTIFACTS.iter().map(|s| s.to_string()).collect(),
            storage: StorageConfig::default(),
            generation: GenerationSettings::default(),
            sentence_language: SentenceLanguage::default(),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl TranslatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(host) = env_opt("HOST") {
            config.host = host;
        }

        if let Some(port) = env_opt("PORT") {
            config.port = port.parse::<u16>()?;
        }

        if let Some(dir) = env_opt("MODEL_DIR") {
            config.model_dir = PathBuf::from(dir);
        }

        let storage = &mut config.storage;
        if let Some(conn) = env_opt("AZURE_STORAGE_CONNECTION_STRING") {
            storage.apply_connection_string(&conn)?;
        }
        if let Some(name) = env_opt("AZURE_STORAGE_ACCOUNT_NAME") {
            storage.account_name = name;
        }
        if let Some(key) = env_opt("AZURE_STORAGE_ACCOUNT_KEY") {
            storage.account_key = Some(key);
        }
        if let Some(sas) = env_opt("AZURE_STORAGE_SAS_TOKEN") {
            storage.sas_token = Some(sas);
        }
        if let Some(endpoint) = env_opt("AZURE_STORAGE_ENDPOINT") {
            storage.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        }
        if let Some(container) = env_opt("MODEL_CONTAINER") {
            storage.container = container;
        }
        if let Some(folder) = env_opt("MODEL_BLOB_FOLDER") {
            storage.blob_folder = folder;
        }
        if let Some(timeout) = env_opt("BLOB_TIMEOUT_MS") {
            storage.timeout_ms = timeout.parse::<u64>()?;
        }

        if let Some(beams) = env_opt("NUM_BEAMS") {
            config.generation.num_beams = beams.parse::<usize>()?;
        }

        if let Some(max_length) = env_opt("MAX_LENGTH") {
            config.generation.max_length = max_length.parse::<usize>()?;
        }

        if let Some(lang) = env_opt("SENTENCE_LANGUAGE") {
            config.sentence_language = lang.parse()?;
        }

        Ok(config)
    }

    /// Load from a JSON, TOML or YAML file; missing keys fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path` when given, otherwise from the environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            return Err(anyhow::anyhow!("port must be greater than 0"));
        }

        if self.artifacts.is_empty() {
            return Err(anyhow::anyhow!("at least one model artifact is required"));
        }

        if self.generation.num_beams == 0 {
            return Err(anyhow::anyhow!("num_beams must be greater than 0"));
        }

        if self.generation.max_length < 2 {
            return Err(anyhow::anyhow!("max_length must leave room for at least one token"));
        }

        if self.storage.account_name.is_empty() && self.storage.endpoint.is_none() {
            warn!("No storage account configured; only artifacts already on disk can be used");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_published_model_layout() {
        let config = TranslatorConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.artifacts.len(), 7);
        assert_eq!(config.storage.container, "dsi-nlp-models");
        assert_eq!(config.storage.blob_folder, "alignment_model");
        assert_eq!(config.generation, GenerationSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_zero_beams() {
        let mut config = TranslatorConfig::default();
        config.generation.num_beams = 0;
        assert!(config.validate().is_err());

        let config = TranslatorConfig {
            artifacts: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connection_string_parsing() {
        let mut storage = StorageConfig::default();
        storage
            .apply_connection_string(
                "DefaultEndpointsProtocol=https;AccountName=models;AccountKey=a2V5PT0=;EndpointSuffix=core.windows.net",
            )
            .unwrap();

        assert_eq!(storage.account_name, "models");
        // base64 padding inside the value must survive the split
        assert_eq!(storage.account_key.as_deref(), Some("a2V5PT0="));
        assert_eq!(storage.endpoint_url(), "https://models.blob.core.windows.net");
    }

    #[test]
    fn test_connection_string_with_sas_and_endpoint() {
        let mut storage = StorageConfig::default();
        storage
            .apply_connection_string(
                "BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1/;SharedAccessSignature=sv=2021&sig=abc",
            )
            .unwrap();

        assert_eq!(storage.endpoint_url(), "http://127.0.0.1:10000/devstoreaccount1");
        assert_eq!(storage.sas_token.as_deref(), Some("sv=2021&sig=abc"));
        assert!(storage.apply_connection_string("garbage").is_err());
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"port": 8080, "sentence_language": "german", "generation": {{"num_beams": 2}}}}"#
        )
        .unwrap();

        let config = TranslatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.sentence_language, SentenceLanguage::German);
        assert_eq!(config.generation.num_beams, 2);
        assert_eq!(config.generation.max_length, 1024);
        assert_eq!(config.storage.container, "dsi-nlp-models");
    }
}
