//! Storage stage: uploads the final artifact and cycles old uploads.
//!
//! ```yaml
//! store_with:
//!   type: local
//!   path: /data/backups
//!   keep: 7
//! ```

mod local;
mod s3;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;

use super::{Stage, StageInput, StageOutcome};
use crate::config::SubConfig;
use crate::cycler::{Cycler, PackageRemover};
use crate::error::{BackrError, Result};

pub use local::Local;
pub use s3::S3;

/// Supported `store_with.type` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    S3,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::S3 => "s3",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "s3" => Ok(StorageKind::S3),
            "" => Err("store_with type is required".to_string()),
            other => Err(format!("unknown storage type `{}`", other)),
        }
    }
}

/// A place artifacts can be uploaded to and deleted from.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> StorageKind;

    /// Prepare the target (create directories, check credentials).
    async fn open(&self) -> Result<()>;

    async fn upload(&self, source: &std::path::Path, file_key: &str) -> Result<()>;

    async fn delete(&self, file_key: &str) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<B: StorageBackend + ?Sized> PackageRemover for B {
    async fn remove(&self, file_key: &str) -> Result<()> {
        self.delete(file_key).await
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetentionOptions {
    keep: u32,
}

/// Uploads through a backend, then records the upload with the [`Cycler`].
pub struct StoreStage {
    backend: Box<dyn StorageBackend>,
    keep: u32,
    cycler: Arc<Cycler>,
}

impl StoreStage {
    pub fn new(backend: Box<dyn StorageBackend>, keep: u32, cycler: Arc<Cycler>) -> Self {
        Self { backend, keep, cycler }
    }

    pub fn keep(&self) -> u32 {
        self.keep
    }
}

/// Build the store stage for `store_with`.
pub fn build(model: &str, sub: &SubConfig, cycler: Arc<Cycler>) -> Result<Box<dyn Stage>> {
    let kind = sub
        .kind
        .parse::<StorageKind>()
        .map_err(|e| BackrError::config(model, "store_with.type", e))?;
    let retention: RetentionOptions = sub
        .options()
        .map_err(|e| BackrError::config(model, "store_with.keep", e.to_string()))?;

    let backend: Box<dyn StorageBackend> = match kind {
        StorageKind::Local => Box::new(Local::from_config(model, sub)?),
        StorageKind::S3 => Box::new(S3::from_config(model, sub)?),
    };
    Ok(Box::new(StoreStage::new(backend, retention.keep, cycler)))
}

#[async_trait]
impl Stage for StoreStage {
    fn name(&self) -> &str {
        self.backend.kind().as_str()
    }

    async fn perform(&self, input: StageInput<'_>) -> Result<StageOutcome> {
        let model = &input.model.name;
        let source = input
            .artifact
            .ok_or_else(|| BackrError::Execution("store: no artifact to upload".to_string()))?;
        let file_key = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| BackrError::Execution(format!("store: {} has no file name", source.display())))?;

        info!("model={} stage=store type={} file_key={}", model, self.backend.kind(), file_key);

        self.backend.open().await?;
        let uploaded = self.backend.upload(source, &file_key).await;
        if uploaded.is_ok() {
            let report = self.cycler.run(model, &file_key, self.keep, self.backend.as_ref()).await;
            info!(
                "model={} stage=store cycled keep={} evicted={} failed_deletions={}",
                model,
                self.keep,
                report.evicted.len(),
                report.failed_deletions.len()
            );
        }
        if let Err(e) = self.backend.close().await {
            warn!("model={} stage=store close failed: {}", model, e);
        }
        uploaded?;

        info!("model={} stage=store completed file_key={}", model, file_key);
        Ok(StageOutcome::produced(source))
    }
}
