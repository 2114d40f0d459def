//! Retention cycler.
//!
//! Keeps a bounded, per-model history of uploaded artifacts. Every successful
//! store appends its file key; when the history grows past `keep` the oldest
//! entries are evicted and handed to a [`PackageRemover`].
//!
//! Runs for the same model are serialized inside one process. Two processes
//! cycling the same model at once can still lose an entry; the rename in
//! [`ledger::save`] only guarantees the file is never half written.

pub mod ledger;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, error, info, warn};

use crate::error::Result;

pub use ledger::{Package, PackageList};

/// Deletes an evicted artifact from wherever it was stored.
#[async_trait]
pub trait PackageRemover: Send + Sync {
    async fn remove(&self, file_key: &str) -> Result<()>;
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Keys evicted from the ledger, oldest first.
    pub evicted: Vec<String>,
    /// Evicted keys whose deletion failed. They are gone from the ledger anyway.
    pub failed_deletions: Vec<String>,
    /// Whether the ledger was written back.
    pub persisted: bool,
}

#[derive(Debug)]
pub struct Cycler {
    ledger_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Cycler {
    pub fn new(ledger_dir: impl Into<PathBuf>) -> Self {
        Self {
            ledger_dir: ledger_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger_dir(&self) -> &Path {
        &self.ledger_dir
    }

    fn model_lock(&self, model: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(model.to_string()).or_default().clone()
    }

    /// Read the current ledger for `model`.
    pub async fn packages(&self, model: &str) -> Result<PackageList> {
        ledger::load(&ledger::ledger_path(&self.ledger_dir, model)).await
    }

    /// Record `file_key` for `model` and evict anything beyond `keep`.
    ///
    /// `keep == 0` keeps everything. Ledger problems are logged and never
    /// returned: an unreadable ledger is left untouched on disk.
    pub async fn run<R>(&self, model: &str, file_key: &str, keep: u32, remover: &R) -> CycleReport
    where
        R: PackageRemover + ?Sized,
    {
        let lock = self.model_lock(model);
        let _guard = lock.lock().await;

        let path = ledger::ledger_path(&self.ledger_dir, model);
        let mut report = CycleReport::default();

        let (mut packages, loaded) = match ledger::load(&path).await {
            Ok(packages) => (packages, true),
            Err(e) => {
                error!("model={} cycler load failed, ledger left untouched: {}", model, e);
                (PackageList::default(), false)
            }
        };

        packages.push(Package::new(file_key));

        if keep > 0 {
            while packages.len() > keep as usize {
                let Some(oldest) = packages.pop_oldest() else {
                    break;
                };
                info!("model={} cycler evicting file_key={}", model, oldest.file_key);
                // a retained entry with the same key still points at that object
                if packages.contains(&oldest.file_key) {
                    warn!("model={} cycler kept file_key={}, still retained", model, oldest.file_key);
                } else if let Err(e) = remover.remove(&oldest.file_key).await {
                    warn!("model={} cycler delete failed file_key={}: {}", model, oldest.file_key, e);
                    report.failed_deletions.push(oldest.file_key.clone());
                }
                report.evicted.push(oldest.file_key);
            }
        }

        if !loaded {
            return report;
        }

        match ledger::save(&path, &packages).await {
            Ok(()) => {
                debug!("model={} cycler saved entries={} path={}", model, packages.len(), path.display());
                report.persisted = true;
            }
            Err(e) => error!("model={} cycler save failed: {}", model, e),
        }
        report
    }
}
