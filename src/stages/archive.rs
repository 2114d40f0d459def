//! File archive stage: packs configured paths into `<dump_path>/archive.tar`.
//!
//! ```yaml
//! archive:
//!   includes:
//!     - /etc/nginx
//!   excludes:
//!     - /etc/nginx/cache
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::info;

use super::{Stage, StageInput, StageOutcome};
use crate::config::ArchiveConfig;
use crate::error::{BackrError, Result};
use crate::helper::{CommandSpec, clean_path, is_gnu_tar, mkdir_p};

pub const ARCHIVE_FILE: &str = "archive.tar";

#[derive(Debug, Clone)]
pub struct Archive {
    includes: Vec<PathBuf>,
    excludes: Vec<PathBuf>,
}

impl Archive {
    pub fn from_config(model: &str, config: &ArchiveConfig) -> Result<Self> {
        let includes: Vec<PathBuf> = config.includes.iter().map(clean_path).collect();
        let excludes: Vec<PathBuf> = config.excludes.iter().map(clean_path).collect();
        if includes.is_empty() {
            return Err(BackrError::config(model, "archive.includes", "at least one path is required"));
        }
        Ok(Self { includes, excludes })
    }

    fn tar_args(&self, tar_path: &Path, gnu_tar: bool) -> Vec<String> {
        let mut args = Vec::new();
        if gnu_tar {
            args.push("--ignore-failed-read".to_string());
        }
        args.push("-cPf".to_string());
        args.push(tar_path.to_string_lossy().into_owned());
        for exclude in &self.excludes {
            args.push(format!("--exclude={}", exclude.display()));
        }
        args.extend(self.includes.iter().map(|p| p.to_string_lossy().into_owned()));
        args
    }
}

#[async_trait]
impl Stage for Archive {
    fn name(&self) -> &str {
        "archive"
    }

    async fn perform(&self, input: StageInput<'_>) -> Result<StageOutcome> {
        let model = input.model;
        mkdir_p(&model.dump_path).await?;
        let tar_path = model.dump_path.join(ARCHIVE_FILE);

        info!(
            "model={} stage=archive include_rules={} exclude_rules={}",
            model.name,
            self.includes.len(),
            self.excludes.len()
        );

        CommandSpec::new("tar")
            .args(self.tar_args(&tar_path, is_gnu_tar().await))
            .run()
            .await
            .map_err(|e| BackrError::Execution(format!("archive: {}", e)))?;

        info!("model={} stage=archive completed path={}", model.name, tar_path.display());
        Ok(StageOutcome::produced(tar_path))
    }
}
