//! Compression stage: tars the model's dump directory into one file.
//!
//! ```yaml
//! compress_with:
//!   type: tgz   # or zstd (default)
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Local;
use log::info;

use super::{Stage, StageInput, StageOutcome};
use crate::config::{ModelSpec, SubConfig};
use crate::error::{BackrError, Result};
use crate::helper::{CommandSpec, is_gnu_tar};

/// Supported `compress_with.type` tags. An empty tag means [`CompressorKind::Zstd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressorKind {
    Tgz,
    #[default]
    Zstd,
}

impl CompressorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressorKind::Tgz => "tgz",
            CompressorKind::Zstd => "zstd",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            CompressorKind::Tgz => ".tar.gz",
            CompressorKind::Zstd => ".tar.zst",
        }
    }

    fn tar_flags(&self) -> &'static str {
        match self {
            CompressorKind::Tgz => "-zcf",
            // -a picks the compressor from the .tar.zst suffix
            CompressorKind::Zstd => "-acf",
        }
    }
}

impl fmt::Display for CompressorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "zstd" => Ok(CompressorKind::Zstd),
            "tgz" | "gzip" => Ok(CompressorKind::Tgz),
            other => Err(format!("unknown compressor type `{}`", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compressor {
    kind: CompressorKind,
}

impl Compressor {
    pub fn new(kind: CompressorKind) -> Self {
        Self { kind }
    }

    pub fn from_config(model: &str, sub: &SubConfig) -> Result<Self> {
        let kind = sub
            .kind
            .parse::<CompressorKind>()
            .map_err(|e| BackrError::config(model, "compress_with.type", e))?;
        Ok(Self::new(kind))
    }

    pub fn kind(&self) -> CompressorKind {
        self.kind
    }

    /// `<temp_path>/<model>.<YYYY.MM.DD.HH.MM.SS.mmm>-<run_seq><ext>`
    ///
    /// The name becomes the storage key, so it has to differ between runs
    /// finishing in the same second and between models sharing a store path.
    fn archive_file_path(&self, spec: &ModelSpec) -> PathBuf {
        let stamp = Local::now().format("%Y.%m.%d.%H.%M.%S%.3f");
        spec.temp_path
            .join(format!("{}.{}-{}{}", spec.name, stamp, spec.run_seq, self.kind.extension()))
    }

    fn tar_args(&self, work_dir: &Path, archive: &Path, entry: &str, gnu_tar: bool) -> Vec<String> {
        let mut args = Vec::new();
        if gnu_tar {
            args.push("--ignore-failed-read".to_string());
        }
        args.push("-C".to_string());
        args.push(work_dir.to_string_lossy().into_owned());
        args.push(self.kind.tar_flags().to_string());
        args.push(archive.to_string_lossy().into_owned());
        args.push(entry.to_string());
        args
    }
}

#[async_trait]
impl Stage for Compressor {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn perform(&self, input: StageInput<'_>) -> Result<StageOutcome> {
        let model = input.model;
        let source = input.artifact.unwrap_or(model.dump_path.as_path());
        let work_dir = source.parent().unwrap_or(model.temp_path.as_path());
        let entry = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| model.name.clone());
        let archive = self.archive_file_path(model);

        info!("model={} stage=compress type={} source={}", model.name, self.kind, source.display());

        CommandSpec::new("tar")
            .args(self.tar_args(work_dir, &archive, &entry, is_gnu_tar().await))
            .run()
            .await
            .map_err(|e| BackrError::Execution(format!("compress: {}", e)))?;

        info!("model={} stage=compress completed path={}", model.name, archive.display());
        Ok(StageOutcome::produced(archive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, ModelConfig};
    use tempfile::TempDir;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("".parse::<CompressorKind>(), Ok(CompressorKind::Zstd));
        assert_eq!("zstd".parse::<CompressorKind>(), Ok(CompressorKind::Zstd));
        assert_eq!("TGZ".parse::<CompressorKind>(), Ok(CompressorKind::Tgz));
        assert!("rar".parse::<CompressorKind>().is_err());
    }

    #[test]
    fn test_from_config_unknown_type() {
        let err = Compressor::from_config("shop", &SubConfig::new("rar")).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("compress_with.type"));
    }

    #[test]
    fn test_archive_file_name() {
        let env = Environment::new("/tmp/backr", "/tmp/ledger");
        let spec = ModelSpec::new("shop", ModelConfig::default(), &env);
        let path = Compressor::new(CompressorKind::Tgz).archive_file_path(&spec);
        assert_eq!(path.parent(), Some(spec.temp_path.as_path()));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("shop."));
        assert!(name.ends_with(&format!("-{}.tar.gz", spec.run_seq)));
    }

    #[test]
    fn test_archive_file_names_differ_between_runs() {
        let env = Environment::new("/tmp/backr", "/tmp/ledger");
        let compressor = Compressor::new(CompressorKind::Zstd);
        let a = ModelSpec::new("shop", ModelConfig::default(), &env);
        let b = ModelSpec::new("shop", ModelConfig::default(), &env);
        assert_ne!(
            compressor.archive_file_path(&a).file_name(),
            compressor.archive_file_path(&b).file_name()
        );
    }

    #[test]
    fn test_tar_args() {
        let compressor = Compressor::new(CompressorKind::Zstd);
        let args = compressor.tar_args(Path::new("/tmp/run"), Path::new("/tmp/run/x.tar.zst"), "shop", false);
        assert_eq!(args, vec!["-C", "/tmp/run", "-acf", "/tmp/run/x.tar.zst", "shop"]);
    }

    #[tokio::test]
    async fn test_perform_tgz() {
        let work = TempDir::new().unwrap();
        let env = Environment::new(work.path(), work.path().join("ledger"));
        let spec = ModelSpec::new("shop", ModelConfig::default(), &env);
        std::fs::create_dir_all(&spec.dump_path).unwrap();
        std::fs::write(spec.dump_path.join("shop.sql"), "select 1;").unwrap();

        let outcome = Compressor::new(CompressorKind::Tgz)
            .perform(StageInput::new(&spec, Some(spec.dump_path.as_path())))
            .await
            .unwrap();

        let archive = outcome.produced_artifact.unwrap();
        assert!(archive.is_file());
        assert!(archive.starts_with(&spec.temp_path));
    }
}
