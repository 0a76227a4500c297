//! Fetch model artifacts into a local directory, skipping files already present

use std::path::Path;
use tracing::info;

use crate::core::errors::{Result, TranslationError};
use crate::storage::blob::BlobStore;

/// Outcome of fetching one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// File was already in the directory
    AlreadyPresent,
    /// File was fetched from the store
    Downloaded {
        /// Size of the written file
        bytes: usize,
    },
}

fn file_error(path: &Path, err: impl std::fmt::Display) -> TranslationError {
    TranslationError::FileError {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Fetch `name` into `dir` unless `dir/name` already exists.
///
/// Downloads land in `name.part` first and are renamed into place, so a
/// partially written file is never mistaken for a complete one.
pub async fn fetch_artifact(store: &dyn BlobStore, dir: &Path, name: &str) -> Result<ArtifactStatus> {
    let target = dir.join(name);

    if tokio::fs::try_exists(&target).await.map_err(|e| file_error(&target, e))? {
        info!("{} already exists in {}, skipping download", name, dir.display());
        return Ok(ArtifactStatus::AlreadyPresent);
    }

    let data = store.fetch(name).await?;

    let partial = dir.join(format!("{}.part", name));
    tokio::fs::write(&partial, &data)
        .await
        .map_err(|e| file_error(&partial, e))?;
    tokio::fs::rename(&partial, &target)
        .await
        .map_err(|e| file_error(&target, e))?;

    info!("Downloaded {} to {}", name, target.display());
    Ok(ArtifactStatus::Downloaded { bytes: data.len() })
}

/// Fetch every artifact in order, stopping at the first failure
pub async fn fetch_all(
    store: &dyn BlobStore,
    dir: &Path,
    names: &[String],
) -> Result<Vec<(String, ArtifactStatus)>> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| file_error(dir, e))?;

    let mut report = Vec::with_capacity(names.len());
    for name in names {
        let status = fetch_artifact(store, dir, name).await?;
        report.push((name.clone(), status));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingStore;

    #[tokio::test]
    async fn test_fetch_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), b"{}").unwrap();

        let store = CountingStore::new();
        let names = vec!["config.json".to_string(), "tokenizer.json".to_string()];
        let report = fetch_all(&store, dir.path(), &names).await.unwrap();

        assert_eq!(report[0].1, ArtifactStatus::AlreadyPresent);
        assert!(matches!(report[1].1, ArtifactStatus::Downloaded { .. }));
        assert_eq!(store.fetches("config.json"), 0);
        assert_eq!(store.fetches("tokenizer.json"), 1);
        assert_eq!(
            std::fs::read(dir.path().join("tokenizer.json")).unwrap(),
            b"contents of tokenizer.json"
        );
        assert!(!dir.path().join("tokenizer.json.part").exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CountingStore::failing_on("model.safetensors");
        let names = vec!["config.json".to_string(), "model.safetensors".to_string()];

        let err = fetch_all(&store, dir.path(), &names).await.unwrap_err();
        assert!(matches!(err, TranslationError::StorageError { .. }));
        assert!(dir.path().join("config.json").exists());
        assert!(!dir.path().join("model.safetensors").exists());
    }

    #[tokio::test]
    async fn test_fetch_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("model");
        let store = CountingStore::new();

        fetch_all(&store, &dir, &["config.json".to_string()]).await.unwrap();
        assert!(dir.join("config.json").exists());
    }
}
