//! Encryption stage. Only runs when `encrypt_with.type` is set.
//!
//! ```yaml
//! encrypt_with:
//!   type: openssl
//!   password: correct-horse
//!   salt: true
//!   base64: false
//!   iter: 100000
//!   pbkdf2: true
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use serde::Deserialize;

use super::{Stage, StageInput, StageOutcome};
use crate::config::{SubConfig, de_lenient_string};
use crate::error::{BackrError, Result};
use crate::helper::CommandSpec;

/// Supported `encrypt_with.type` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptorKind {
    OpenSsl,
}

impl EncryptorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptorKind::OpenSsl => "openssl",
        }
    }
}

impl fmt::Display for EncryptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openssl" => Ok(EncryptorKind::OpenSsl),
            other => Err(format!("unknown encryptor type `{}`", other)),
        }
    }
}

/// Build the encrypt stage, or `None` when encryption is not configured.
pub fn build(model: &str, sub: &SubConfig) -> Result<Option<Box<dyn Stage>>> {
    if !sub.is_configured() {
        return Ok(None);
    }
    let kind = sub
        .kind
        .parse::<EncryptorKind>()
        .map_err(|e| BackrError::config(model, "encrypt_with.type", e))?;
    let stage: Box<dyn Stage> = match kind {
        EncryptorKind::OpenSsl => Box::new(OpenSsl::from_config(model, sub)?),
    };
    Ok(Some(stage))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
struct OpenSslOptions {
    #[serde(deserialize_with = "de_lenient_string")]
    password: String,
    salt: bool,
    base64: bool,
    iter: u32,
    pbkdf2: bool,
}

impl Default for OpenSslOptions {
    fn default() -> Self {
        Self {
            password: String::new(),
            salt: true,
            base64: false,
            iter: 100_000,
            pbkdf2: true,
        }
    }
}

/// `openssl aes-256-cbc`, password handed over through the child's environment.
#[derive(Debug, Clone)]
pub struct OpenSsl {
    options: OpenSslOptions,
}

impl OpenSsl {
    pub fn from_config(model: &str, sub: &SubConfig) -> Result<Self> {
        let options: OpenSslOptions = sub
            .options()
            .map_err(|e| BackrError::config(model, "encrypt_with", e.to_string()))?;
        if options.password.is_empty() {
            return Err(BackrError::config(model, "encrypt_with.password", "password is required"));
        }
        Ok(Self { options })
    }

    fn command(&self, source: &Path, target: &Path) -> CommandSpec {
        let opts = &self.options;
        let env_name = format!(
            "BACKR_OPENSSL_PASSWORD_{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );

        let mut cmd = CommandSpec::new("openssl").arg("aes-256-cbc");
        if opts.base64 {
            cmd = cmd.arg("-base64");
        }
        if opts.salt {
            cmd = cmd.arg("-salt");
        }
        if opts.iter > 0 {
            cmd = cmd.args(["-iter".to_string(), opts.iter.to_string()]);
        }
        if opts.pbkdf2 {
            cmd = cmd.arg("-pbkdf2");
        }
        cmd.arg("-pass")
            .arg(format!("env:{}", env_name))
            .arg("-in")
            .arg(source.to_string_lossy())
            .arg("-out")
            .arg(target.to_string_lossy())
            .env(env_name, opts.password.clone())
    }
}

fn encrypted_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(".enc");
    PathBuf::from(name)
}

#[async_trait]
impl Stage for OpenSsl {
    fn name(&self) -> &str {
        "openssl"
    }

    async fn perform(&self, input: StageInput<'_>) -> Result<StageOutcome> {
        let source = input
            .artifact
            .ok_or_else(|| BackrError::Execution("encrypt: no artifact to encrypt".to_string()))?;
        let target = encrypted_path(source);

        info!(
            "model={} stage=encrypt type=openssl source={}",
            input.model.name,
            source.display()
        );

        self.command(source, &target)
            .run()
            .await
            .map_err(|e| BackrError::Execution(format!("encrypt: {}", e)))?;

        info!("model={} stage=encrypt completed path={}", input.model.name, target.display());
        Ok(StageOutcome::produced(target))
    }
}
