//! Maps a model's config sections onto concrete stages.

use std::sync::Arc;

use log::warn;

use super::{Pipeline, archive::Archive, compressor::Compressor, database, encryptor, storage};
use crate::config::ModelSpec;
use crate::cycler::Cycler;
use crate::error::Result;
use crate::notifier::{self, NotifierEntry};

/// Resolves the stages and notifiers for a model.
pub trait StageRegistry: Send + Sync {
    /// Build every stage of the model's pipeline. Any unknown type tag or
    /// missing required option is a configuration error.
    fn pipeline(&self, spec: &ModelSpec) -> Result<Pipeline>;

    /// Build the model's notifiers. Misconfigured notifiers are skipped.
    fn notifiers(&self, spec: &ModelSpec) -> Vec<NotifierEntry>;
}

/// The stages shipped with backr.
#[derive(Debug, Clone)]
pub struct BuiltinRegistry {
    cycler: Arc<Cycler>,
}

impl BuiltinRegistry {
    pub fn new(cycler: Arc<Cycler>) -> Self {
        Self { cycler }
    }

    pub fn cycler(&self) -> &Arc<Cycler> {
        &self.cycler
    }

    /// Build notifiers, returning configuration errors instead of skipping them.
    pub fn try_notifiers(&self, spec: &ModelSpec) -> Vec<Result<NotifierEntry>> {
        spec.config
            .notifiers
            .iter()
            .map(|(name, sub)| notifier::build(&spec.name, name, sub))
            .collect()
    }
}

impl StageRegistry for BuiltinRegistry {
    fn pipeline(&self, spec: &ModelSpec) -> Result<Pipeline> {
        let model = spec.name.as_str();
        let config = &spec.config;

        let dumps = config
            .databases
            .iter()
            .map(|(name, sub)| database::build(model, name, sub))
            .collect::<Result<Vec<_>>>()?;

        let archive = match &config.archive {
            Some(archive) => Some(Box::new(Archive::from_config(model, archive)?) as Box<dyn super::Stage>),
            None => None,
        };

        Ok(Pipeline {
            dumps,
            archive,
            compress: Box::new(Compressor::from_config(model, &config.compress_with)?),
            encrypt: encryptor::build(model, &config.encrypt_with)?,
            store: storage::build(model, &config.store_with, self.cycler.clone())?,
        })
    }

    fn notifiers(&self, spec: &ModelSpec) -> Vec<NotifierEntry> {
        self.try_notifiers(spec)
            .into_iter()
            .filter_map(|built| match built {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("model={} skipping notifier: {}", spec.name, e);
                    None
                }
            })
            .collect()
    }
}
