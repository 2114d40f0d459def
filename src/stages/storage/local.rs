//! Local filesystem storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::info;
use serde::Deserialize;

use super::{StorageBackend, StorageKind};
use crate::config::SubConfig;
use crate::error::{BackrError, Result};
use crate::helper::{expand_home, mkdir_p};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocalOptions {
    path: String,
}

#[derive(Debug, Clone)]
pub struct Local {
    path: PathBuf,
}

impl Local {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(model: &str, sub: &SubConfig) -> Result<Self> {
        let options: LocalOptions = sub
            .options()
            .map_err(|e| BackrError::config(model, "store_with", e.to_string()))?;
        if options.path.trim().is_empty() {
            return Err(BackrError::config(model, "store_with.path", "local storage path is required"));
        }
        Ok(Self::new(expand_home(options.path.trim())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StorageBackend for Local {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    async fn open(&self) -> Result<()> {
        mkdir_p(&self.path).await?;
        Ok(())
    }

    async fn upload(&self, source: &Path, file_key: &str) -> Result<()> {
        let target = self.path.join(file_key);
        tokio::fs::copy(source, &target)
            .await
            .map_err(|e| BackrError::Execution(format!("copy {} to {}: {}", source.display(), target.display(), e)))?;
        info!("storage=local stored {}", target.display());
        Ok(())
    }

    async fn delete(&self, file_key: &str) -> Result<()> {
        let target = self.path.join(file_key);
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| BackrError::Execution(format!("remove {}: {}", target.display(), e)))?;
        info!("storage=local removed {}", target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_path_required() {
        let err = Local::from_config("shop", &SubConfig::new("local")).unwrap_err();
        assert!(err.to_string().contains("store_with.path"));
    }

    #[tokio::test]
    async fn test_upload_and_delete() {
        let src = TempDir::new().unwrap();
        let artifact = src.path().join("2024.01.01.00.00.00.tar.zst");
        std::fs::write(&artifact, b"payload").unwrap();

        let dest = TempDir::new().unwrap();
        let local = Local::new(dest.path().join("nested/backups"));
        local.open().await.unwrap();
        local.upload(&artifact, "2024.01.01.00.00.00.tar.zst").await.unwrap();

        let stored = local.path().join("2024.01.01.00.00.00.tar.zst");
        assert_eq!(std::fs::read(&stored).unwrap(), b"payload");

        local.delete("2024.01.01.00.00.00.tar.zst").await.unwrap();
        assert!(!stored.exists());
        assert!(local.delete("2024.01.01.00.00.00.tar.zst").await.is_err());
    }
}
