//! backr - config driven backups.
//!
//! Each model declared in `backr.yml` is dumped, packed, optionally
//! encrypted, stored and cycled by a [`coordinator::Coordinator`]. Stages are
//! pluggable behind [`stages::Stage`]; uploaded artifacts are tracked per model
//! by the [`cycler::Cycler`].

pub mod config;
pub mod coordinator;
pub mod cycler;
pub mod error;
pub mod helper;
pub mod notifier;
pub mod stages;

pub use error::{BackrError, Result};
