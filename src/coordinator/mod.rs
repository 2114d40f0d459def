//! Pipeline coordinator.
//!
//! One [`Coordinator::perform`] call is one backup run for one model. Runs of
//! different models share nothing but the retention cycler's lock table, so
//! they can be driven concurrently.

mod pipeline_runner;
mod workspace;

pub use pipeline_runner::{Coordinator, RunResult};
pub use workspace::TempWorkspace;
