//! Run-time view of a model: its configuration plus the working paths for one run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use super::model::ModelConfig;

static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Process-level locations threaded into the coordinator and cycler.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Parent of every run's temp directory.
    pub temp_root: PathBuf,
    /// Directory holding one retention ledger per model.
    pub ledger_dir: PathBuf,
}

impl Environment {
    pub fn new(temp_root: impl Into<PathBuf>, ledger_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            ledger_dir: ledger_dir.into(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir().join("backr"),
            ledger_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("backr")
                .join("cycler"),
        }
    }
}

/// Everything one run of a model needs. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    /// Process-wide run counter, distinguishes runs started in the same instant.
    pub run_seq: u64,
    /// Run-unique scratch directory, removed during finalize.
    pub temp_path: PathBuf,
    /// `<temp_path>/<name>`, where dumps and the archive land.
    pub dump_path: PathBuf,
    pub config: ModelConfig,
}

impl ModelSpec {
    /// Build the spec for a fresh run, allocating a run-unique temp path.
    pub fn new(name: impl Into<String>, config: ModelConfig, env: &Environment) -> Self {
        let name = name.into();
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seq = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
        let temp_path = env.temp_root.join(format!("{}-{}", nanos, seq));
        let dump_path = temp_path.join(&name);
        Self {
            name,
            run_seq: seq,
            temp_path,
            dump_path,
            config,
        }
    }

    pub fn before_script(&self) -> Option<&str> {
        non_empty(self.config.before_script.as_deref())
    }

    pub fn after_script(&self) -> Option<&str> {
        non_empty(self.config.after_script.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
