//! Blob storage access for model artifacts

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

use crate::core::config::StorageConfig;
use crate::core::errors::{Result, TranslationError};

const STORAGE_API_VERSION: &str = "2021-08-06";

/// Source of named model artifacts
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the full contents of `name`
    async fn fetch(&self, name: &str) -> Result<Vec<u8>>;
}

/// How requests to the blob service are authorized
#[derive(Clone)]
enum BlobAuth {
    Anonymous,
    Sas(String),
    SharedKey { account: String, key: Vec<u8> },
}

impl std::fmt::Debug for BlobAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobAuth::Anonymous => write!(f, "Anonymous"),
            BlobAuth::Sas(_) => write!(f, "Sas(..)"),
            BlobAuth::SharedKey { account, .. } => write!(f, "SharedKey({})", account),
        }
    }
}

/// Azure Blob Storage reader over plain REST
#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    client: reqwest::Client,
    endpoint: String,
    container: String,
    folder: String,
    auth: BlobAuth,
}

impl AzureBlobStore {
    /// Create a store from storage configuration
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .build()?;

        let auth = if let Some(sas) = &config.sas_token {
            BlobAuth::Sas(sas.trim_start_matches('?').to_string())
        } else if let Some(key) = &config.account_key {
            let key = BASE64.decode(key.trim()).map_err(|e| TranslationError::ConfigError {
                message: format!("storage account key is not valid base64: {}", e),
            })?;
            if config.account_name.is_empty() {
                return Err(TranslationError::ConfigError {
                    message: "account key given without an account name".to_string(),
                });
            }
            BlobAuth::SharedKey {
                account: config.account_name.clone(),
                key,
            }
        } else {
            BlobAuth::Anonymous
        };

        Ok(Self {
            client,
            endpoint: config.endpoint_url().trim_end_matches('/').to_string(),
            container: config.container.clone(),
            folder: config.blob_folder.trim_matches('/').to_string(),
            auth,
        })
    }

    /// Path of a blob below the container, folder prefix included
    fn blob_path(&self, name: &str) -> String {
        if self.folder.is_empty() {
            format!("{}/{}", self.container, name)
        } else {
            format!("{}/{}/{}", self.container, self.folder, name)
        }
    }

    fn blob_url(&self, name: &str) -> String {
        let url = format!("{}/{}", self.endpoint, self.blob_path(name));
        match &self.auth {
            BlobAuth::Sas(token) => format!("{}?{}", url, token),
            _ => url,
        }
    }

    /// Canonical `SharedKey` string-to-sign for a GET with no body.
    ///
    /// The eleven standard headers between the verb and the `x-ms-*` headers
    /// are all empty for these requests.
    fn string_to_sign(&self, account: &str, name: &str, date: &str) -> String {
        format!(
            "GET\n\n\n\n\n\n\n\n\n\n\n\nx-ms-date:{}\nx-ms-version:{}\n/{}/{}",
            date,
            STORAGE_API_VERSION,
            account,
            self.blob_path(name)
        )
    }

    /// `SharedKey` authorization header for a GET with no body
    fn shared_key_header(&self, account: &str, key: &[u8], name: &str, date: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|e| TranslationError::ConfigError {
            message: format!("invalid storage account key: {}", e),
        })?;
        mac.update(self.string_to_sign(account, name, date).as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKey {}:{}", account, signature))
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let mut request = self
            .client
            .get(self.blob_url(name))
            .header("x-ms-date", &date)
            .header("x-ms-version", STORAGE_API_VERSION);

        if let BlobAuth::SharedKey { account, key } = &self.auth {
            request = request.header("Authorization", self.shared_key_header(account, key, name, &date)?);
        }

        debug!("Fetching blob {}", self.blob_path(name));

        let response = request.send().await.map_err(|e| TranslationError::StorageError {
            blob: name.to_string(),
            status: None,
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranslationError::StorageError {
                blob: name.to_string(),
                status: Some(status.as_u16()),
                message,
            });
        }

        let bytes = response.bytes().await.map_err(|e| TranslationError::StorageError {
            blob: name.to_string(),
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> StorageConfig {
        StorageConfig {
            account_name: "acct".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_blob_url_with_sas() {
        let config = StorageConfig {
            sas_token: Some("?sv=2021&sig=x".to_string()),
            ..storage()
        };
        let store = AzureBlobStore::new(&config).unwrap();

        assert_eq!(
            store.blob_url("tokenizer.json"),
            "https://acct.blob.core.windows.net/dsi-nlp-models/alignment_model/tokenizer.json?sv=2021&sig=x"
        );
    }

    #[test]
    fn test_shared_key_string_to_sign() {
        let config = StorageConfig {
            account_key: Some(BASE64.encode(b"secret")),
            ..storage()
        };
        let store = AzureBlobStore::new(&config).unwrap();

        assert_eq!(
            store.string_to_sign("acct", "config.json", "Mon, 01 Jan 2024 00:00:00 GMT"),
            concat!(
                "GET\n",
                "\n\n\n\n\n\n\n\n\n\n\n",
                "x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n",
                "x-ms-version:2021-08-06\n",
                "/acct/dsi-nlp-models/alignment_model/config.json"
            )
        );
    }

    #[test]
    fn test_shared_key_signature_matches_reference() {
        let config = StorageConfig {
            account_key: Some(BASE64.encode(b"secret")),
            ..storage()
        };
        let store = AzureBlobStore::new(&config).unwrap();

        // HMAC-SHA256 of the string above under key "secret", as produced by
        // `openssl dgst -sha256 -hmac secret -binary | base64`
        let date = "Mon, 01 Jan 2024 00:00:00 GMT";
        assert_eq!(
            store.shared_key_header("acct", b"secret", "config.json", date).unwrap(),
            "SharedKey acct:MtuovBxGYorQh2IN5B5sPeo+daT6papal2yU2KZU+x4="
        );
        assert_ne!(
            store.shared_key_header("acct", b"secret", "model.safetensors", date).unwrap(),
            store.shared_key_header("acct", b"secret", "config.json", date).unwrap()
        );
    }

    #[test]
    fn test_bad_account_key_is_config_error() {
        let config = StorageConfig {
            account_key: Some("not base64!!".to_string()),
            ..storage()
        };
        assert!(matches!(
            AzureBlobStore::new(&config),
            Err(TranslationError::ConfigError { .. })
        ));
    }
}
