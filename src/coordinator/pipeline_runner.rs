//! Runs one model end to end.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;
use log::{debug, error, info, warn};

use super::workspace::TempWorkspace;
use crate::config::ModelSpec;
use crate::error::{BackrError, Result};
use crate::helper::CommandSpec;
use crate::notifier;
use crate::stages::{Stage, StageInput, StagePhase, StageRegistry};

/// Outcome of one model run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Success,
    /// The first error that stopped the run
    Failed(String),
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Success)
    }
}

/// Drives a model through its stages.
///
/// Order: before script, dumps, archive, compress, encrypt, store. The first
/// failing stage stops the rest. Whatever happens, the temp directory is
/// removed, the after script runs and notifiers are told exactly once.
pub struct Coordinator {
    registry: Arc<dyn StageRegistry>,
}

impl Coordinator {
    pub fn new(registry: Arc<dyn StageRegistry>) -> Self {
        Self { registry }
    }

    pub async fn perform(&self, spec: &ModelSpec) -> RunResult {
        let started = Instant::now();
        info!("model={} run started temp_path={}", spec.name, spec.temp_path.display());

        let mut workspace = TempWorkspace::new(&spec.temp_path);

        if let Some(script) = spec.before_script() {
            run_script(spec, "before_script", script).await;
        }

        let result = match AssertUnwindSafe(self.run_content(spec, &workspace)).catch_unwind().await {
            Ok(Ok(())) => RunResult::Success,
            Ok(Err(e)) => {
                error!("model={} run failed: {}", spec.name, e);
                RunResult::Failed(e.to_string())
            }
            Err(panic) => {
                let e = BackrError::Fault(panic_message(&*panic));
                error!("model={} run aborted: {}", spec.name, e);
                RunResult::Failed(e.to_string())
            }
        };

        self.finalize(spec, &mut workspace).await;
        self.notify(spec, &result).await;

        info!(
            "model={} run finished success={} elapsed_ms={}",
            spec.name,
            result.is_success(),
            started.elapsed().as_millis()
        );
        result
    }

    /// Run several models and return their results in input order.
    ///
    /// With `parallel` the runs are polled concurrently; otherwise one after
    /// another. A failing model never stops the others.
    pub async fn perform_all(&self, specs: &[ModelSpec], parallel: bool) -> Vec<RunResult> {
        if parallel {
            return join_all(specs.iter().map(|spec| self.perform(spec))).await;
        }
        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            results.push(self.perform(spec).await);
        }
        results
    }

    async fn run_content(&self, spec: &ModelSpec, workspace: &TempWorkspace) -> Result<()> {
        workspace.create(&spec.dump_path).await?;

        let pipeline = self.registry.pipeline(spec)?;
        debug!("model={} resolved {:?}", spec.name, pipeline);

        for dump in &pipeline.dumps {
            run_stage(StagePhase::Dump, dump.as_ref(), StageInput::new(spec, None)).await?;
        }

        if let Some(archive) = &pipeline.archive {
            run_stage(StagePhase::Archive, archive.as_ref(), StageInput::new(spec, None)).await?;
        }

        let compressed = run_stage(StagePhase::Compress, pipeline.compress.as_ref(), StageInput::new(spec, None))
            .await?
            .ok_or_else(|| BackrError::Execution("compress produced no artifact".to_string()))?;

        let artifact = match &pipeline.encrypt {
            Some(encrypt) => run_stage(
                StagePhase::Encrypt,
                encrypt.as_ref(),
                StageInput::new(spec, Some(compressed.as_path())),
            )
            .await?
            .ok_or_else(|| BackrError::Execution("encrypt produced no artifact".to_string()))?,
            None => compressed,
        };

        run_stage(
            StagePhase::Store,
            pipeline.store.as_ref(),
            StageInput::new(spec, Some(artifact.as_path())),
        )
        .await?;
        Ok(())
    }

    async fn finalize(&self, spec: &ModelSpec, workspace: &mut TempWorkspace) {
        info!("model={} cleaning up temp_path={}", spec.name, workspace.root().display());
        if let Err(e) = workspace.remove().await {
            error!("model={} cleanup failed temp_path={}: {}", spec.name, workspace.root().display(), e);
        }

        if let Some(script) = spec.after_script() {
            run_script(spec, "after_script", script).await;
        }
    }

    async fn notify(&self, spec: &ModelSpec, result: &RunResult) {
        let dispatched = AssertUnwindSafe(async {
            let entries = self.registry.notifiers(spec);
            notifier::dispatch(&entries, &spec.name, result).await
        })
        .catch_unwind()
        .await;

        match dispatched {
            Ok(delivered) => debug!("model={} notifications delivered={}", spec.name, delivered),
            Err(panic) => error!(
                "model={} notifier panicked: {}",
                spec.name,
                panic_message(&*panic)
            ),
        }
    }
}

async fn run_stage(phase: StagePhase, stage: &dyn Stage, input: StageInput<'_>) -> Result<Option<PathBuf>> {
    let model = &input.model.name;
    let started = Instant::now();
    debug!("model={} stage={} type={} starting", model, phase, stage.name());

    match stage.perform(input).await {
        Ok(outcome) => {
            debug!(
                "model={} stage={} type={} done elapsed_ms={}",
                model,
                phase,
                stage.name(),
                started.elapsed().as_millis()
            );
            Ok(outcome.produced_artifact)
        }
        Err(e) => {
            error!("model={} stage={} type={} failed: {}", model, phase, stage.name(), e);
            Err(e)
        }
    }
}

async fn run_script(spec: &ModelSpec, which: &str, script: &str) {
    info!("model={} running {}", spec.name, which);
    if let Err(e) = CommandSpec::parse(script).inherit_stdout().run().await {
        warn!("model={} {} failed: {}", spec.name, which, e);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("stage panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("stage panicked: {}", s)
    } else {
        "stage panicked".to_string()
    }
}
