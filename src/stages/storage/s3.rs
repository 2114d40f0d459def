//! S3-compatible storage through the `aws` CLI.
//!
//! ```yaml
//! store_with:
//!   type: s3
//!   bucket: backups
//!   path: db/shop
//!   region: eu-west-1
//!   endpoint: https://minio.internal:9000
//!   access_key_id: ...
//!   secret_access_key: ...
//!   token: ...            # session token for temporary credentials
//! ```
//!
//! `force_path_style` is accepted and ignored: the CLI picks path-style
//! addressing itself when `endpoint` is set.

use std::path::Path;

use async_trait::async_trait;
use log::info;
use serde::Deserialize;

use super::{StorageBackend, StorageKind};
use crate::config::SubConfig;
use crate::error::{BackrError, Result};
use crate::helper::CommandSpec;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
struct S3Options {
    bucket: String,
    path: String,
    region: String,
    endpoint: String,
    access_key_id: String,
    secret_access_key: String,
    token: String,
}

impl Default for S3Options {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            path: String::new(),
            region: "us-east-1".to_string(),
            endpoint: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            token: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct S3 {
    options: S3Options,
}

impl S3 {
    pub fn from_config(model: &str, sub: &SubConfig) -> Result<Self> {
        let options: S3Options = sub
            .options()
            .map_err(|e| BackrError::config(model, "store_with", e.to_string()))?;
        if options.bucket.trim().is_empty() {
            return Err(BackrError::config(model, "store_with.bucket", "s3 bucket is required"));
        }
        Ok(Self { options })
    }

    /// `s3://<bucket>/<path>/<file_key>`
    fn object_url(&self, file_key: &str) -> String {
        let prefix = self.options.path.trim_matches('/');
        if prefix.is_empty() {
            format!("s3://{}/{}", self.options.bucket, file_key)
        } else {
            format!("s3://{}/{}/{}", self.options.bucket, prefix, file_key)
        }
    }

    fn aws(&self) -> CommandSpec {
        let opts = &self.options;
        let mut cmd = CommandSpec::new("aws")
            .arg("s3")
            .env("AWS_DEFAULT_REGION", opts.region.clone());
        if !opts.access_key_id.is_empty() {
            cmd = cmd.env("AWS_ACCESS_KEY_ID", opts.access_key_id.clone());
        }
        if !opts.secret_access_key.is_empty() {
            cmd = cmd.env("AWS_SECRET_ACCESS_KEY", opts.secret_access_key.clone());
        }
        if !opts.token.is_empty() {
            cmd = cmd.env("AWS_SESSION_TOKEN", opts.token.clone());
        }
        cmd
    }

    fn with_endpoint(&self, cmd: CommandSpec) -> CommandSpec {
        if self.options.endpoint.is_empty() {
            cmd
        } else {
            cmd.arg("--endpoint-url").arg(self.options.endpoint.clone())
        }
    }

    fn upload_command(&self, source: &Path, file_key: &str) -> CommandSpec {
        let cmd = self
            .aws()
            .arg("cp")
            .arg(source.to_string_lossy())
            .arg(self.object_url(file_key))
            .arg("--only-show-errors");
        self.with_endpoint(cmd)
    }

    fn delete_command(&self, file_key: &str) -> CommandSpec {
        let cmd = self.aws().arg("rm").arg(self.object_url(file_key)).arg("--only-show-errors");
        self.with_endpoint(cmd)
    }
}

#[async_trait]
impl StorageBackend for S3 {
    fn kind(&self) -> StorageKind {
        StorageKind::S3
    }

    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn upload(&self, source: &Path, file_key: &str) -> Result<()> {
        let url = self.object_url(file_key);
        self.upload_command(source, file_key)
            .run()
            .await
            .map_err(|e| BackrError::Execution(format!("upload {}: {}", url, e)))?;
        info!("storage=s3 stored {}", url);
        Ok(())
    }

    async fn delete(&self, file_key: &str) -> Result<()> {
        let url = self.object_url(file_key);
        self.delete_command(file_key)
            .run()
            .await
            .map_err(|e| BackrError::Execution(format!("remove {}: {}", url, e)))?;
        info!("storage=s3 removed {}", url);
        Ok(())
    }
}
