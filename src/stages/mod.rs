//! Pluggable pipeline stages.
//!
//! Every dump, archive, compress, encrypt and store implementation exposes the
//! same [`Stage`] capability. The coordinator only ever sees `dyn Stage`; the
//! concrete type is chosen by the `type` tag of the model's config section
//! (see [`registry`]).

pub mod archive;
pub mod compressor;
pub mod database;
pub mod encryptor;
pub mod registry;
pub mod storage;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::ModelSpec;
use crate::error::Result;

pub use registry::{BuiltinRegistry, StageRegistry};

/// Which slot of the pipeline a stage fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    Dump,
    Archive,
    Compress,
    Encrypt,
    Store,
}

impl StagePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagePhase::Dump => "dump",
            StagePhase::Archive => "archive",
            StagePhase::Compress => "compress",
            StagePhase::Encrypt => "encrypt",
            StagePhase::Store => "store",
        }
    }
}

impl fmt::Display for StagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage receives: the model being run and the previous artifact, if any.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub model: &'a ModelSpec,
    pub artifact: Option<&'a Path>,
}

impl<'a> StageInput<'a> {
    pub fn new(model: &'a ModelSpec, artifact: Option<&'a Path>) -> Self {
        Self { model, artifact }
    }
}

/// What a stage hands to the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutcome {
    /// File or directory produced by this stage.
    pub produced_artifact: Option<PathBuf>,
}

impl StageOutcome {
    pub fn produced(path: impl Into<PathBuf>) -> Self {
        Self {
            produced_artifact: Some(path.into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// A unit of pipeline work selected by a type tag.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Type tag or instance name, used in logs.
    fn name(&self) -> &str;

    /// Run the stage to completion.
    async fn perform(&self, input: StageInput<'_>) -> Result<StageOutcome>;
}

/// The resolved stages for one model, in execution order.
pub struct Pipeline {
    pub dumps: Vec<Box<dyn Stage>>,
    pub archive: Option<Box<dyn Stage>>,
    pub compress: Box<dyn Stage>,
    /// `None` means the compressed artifact is stored as is.
    pub encrypt: Option<Box<dyn Stage>>,
    pub store: Box<dyn Stage>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("dumps", &self.dumps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("archive", &self.archive.as_ref().map(|s| s.name()))
            .field("compress", &self.compress.name())
            .field("encrypt", &self.encrypt.as_ref().map(|s| s.name()))
            .field("store", &self.store.name())
            .finish()
    }
}
