//! Persistent index definitions.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use content_indexer_shared::IndexDefinition;

use crate::errors::IndexerError;

/// Where index definitions are loaded from at startup and saved to on edit.
#[async_trait]
pub trait IndexDefinitionStore: Send + Sync {
    async fn load(&self) -> Result<Vec<IndexDefinition>, IndexerError>;

    /// Replace every stored definition.
    async fn save(&self, definitions: &[IndexDefinition]) -> Result<(), IndexerError>;
}

/// Definitions kept as a JSON array in one file.
///
/// A missing file loads as an empty set. Saves write a sibling temporary
/// file and rename it over the original.
#[derive(Debug, Clone)]
pub struct JsonFileIndexStore {
    path: PathBuf,
}

impl JsonFileIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl IndexDefinitionStore for JsonFileIndexStore {
    async fn load(&self) -> Result<Vec<IndexDefinition>, IndexerError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Index definition file not found, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(IndexerError::store(format!(
                    "Failed to read '{}': {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let definitions: Vec<IndexDefinition> = serde_json::from_slice(&bytes).map_err(|e| {
            IndexerError::store(format!("Invalid definitions in '{}': {}", self.path.display(), e))
        })?;
        info!(path = %self.path.display(), count = definitions.len(), "Loaded index definitions");
        Ok(definitions)
    }

    async fn save(&self, definitions: &[IndexDefinition]) -> Result<(), IndexerError> {
        let json = serde_json::to_vec_pretty(definitions)
            .map_err(|e| IndexerError::store(e.to_string()))?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| IndexerError::store(format!("Failed to write '{}': {}", temp.display(), e)))?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            IndexerError::store(format!("Failed to replace '{}': {}", self.path.display(), e))
        })?;
        info!(path = %self.path.display(), count = definitions.len(), "Saved index definitions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_indexer_shared::IncludedPath;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileIndexStore::new(dir.path().join("indices.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileIndexStore::new(dir.path().join("indices.json"));
        let definitions = vec![IndexDefinition::new(1, "Blog", "main")
            .with_languages(["en", "fr"])
            .with_path(IncludedPath::new("/blog/%").with_content_types(["Article"]))];

        store.save(&definitions).await.unwrap();
        assert_eq!(store.load().await.unwrap(), definitions);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_strategy_key_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indices.json");
        std::fs::write(
            &path,
            r#"[{"identifier":1,"index_name":"Blog","channel_name":"main","languages":["en"]}]"#,
        )
        .unwrap();

        let definitions = JsonFileIndexStore::new(path).load().await.unwrap();
        assert_eq!(definitions[0].strategy_key, "default");
    }

    #[tokio::test]
    async fn test_invalid_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indices.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonFileIndexStore::new(path).load().await;
        assert!(matches!(result, Err(IndexerError::StoreError(_))));
    }
}
