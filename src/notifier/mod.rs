//! Run outcome notifications.
//!
//! Every notifier gets the same title and message. Delivery failures are
//! logged and never change the outcome of the run.

pub mod webhook;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Local;
use log::{info, warn};
use serde::Deserialize;

use crate::config::SubConfig;
use crate::coordinator::RunResult;
use crate::error::{BackrError, Result};

pub use webhook::Webhook;

const TITLE_PREFIX: &str = "[backr]";

/// Supported `notifiers.<name>.type` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    Webhook,
}

impl NotifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifierKind::Webhook => "webhook",
        }
    }
}

impl fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(NotifierKind::Webhook),
            other => Err(format!("unknown notifier type `{}`", other)),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn kind(&self) -> NotifierKind;

    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// The text sent for one finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(model: &str) -> Self {
        Self {
            title: format!("{} OK: Backup {} has succeeded", TITLE_PREFIX, model),
            message: format!(
                "Backup of {} completed successfully at {}",
                model,
                Local::now().format("%Y-%m-%d %H:%M:%S %:z")
            ),
        }
    }

    pub fn failure(model: &str, reason: &str) -> Self {
        Self {
            title: format!("{} Err: Backup {} has failed", TITLE_PREFIX, model),
            message: format!(
                "Backup of {} failed at {}:\n\n{}",
                model,
                Local::now().format("%Y-%m-%d %H:%M:%S %:z"),
                reason
            ),
        }
    }

    pub fn for_result(model: &str, result: &RunResult) -> Self {
        match result {
            RunResult::Success => Self::success(model),
            RunResult::Failed(reason) => Self::failure(model, reason),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Gates {
    on_success: bool,
    on_failure: bool,
}

impl Default for Gates {
    fn default() -> Self {
        Self {
            on_success: true,
            on_failure: true,
        }
    }
}

/// A configured notifier plus which outcomes it wants to hear about.
pub struct NotifierEntry {
    pub name: String,
    pub notifier: Box<dyn Notifier>,
    pub on_success: bool,
    pub on_failure: bool,
}

impl NotifierEntry {
    pub fn new(name: impl Into<String>, notifier: Box<dyn Notifier>) -> Self {
        Self {
            name: name.into(),
            notifier,
            on_success: true,
            on_failure: true,
        }
    }

    pub fn wants(&self, result: &RunResult) -> bool {
        match result {
            RunResult::Success => self.on_success,
            RunResult::Failed(_) => self.on_failure,
        }
    }
}

impl fmt::Debug for NotifierEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierEntry")
            .field("name", &self.name)
            .field("kind", &self.notifier.kind())
            .field("on_success", &self.on_success)
            .field("on_failure", &self.on_failure)
            .finish()
    }
}

/// Build the notifier configured as `notifiers.<name>`.
pub fn build(model: &str, name: &str, sub: &SubConfig) -> Result<NotifierEntry> {
    let field = format!("notifiers.{}", name);
    let kind = sub
        .kind
        .parse::<NotifierKind>()
        .map_err(|e| BackrError::config(model, format!("{}.type", field), e))?;
    let gates: Gates = sub
        .options()
        .map_err(|e| BackrError::config(model, field.as_str(), e.to_string()))?;

    let notifier: Box<dyn Notifier> = match kind {
        NotifierKind::Webhook => Box::new(Webhook::from_config(model, name, sub)?),
    };
    Ok(NotifierEntry {
        name: name.to_string(),
        notifier,
        on_success: gates.on_success,
        on_failure: gates.on_failure,
    })
}

/// Send the outcome of `model`'s run to every interested notifier.
///
/// Returns how many deliveries succeeded.
pub async fn dispatch(entries: &[NotifierEntry], model: &str, result: &RunResult) -> usize {
    let notification = Notification::for_result(model, result);
    let mut delivered = 0;

    for entry in entries.iter().filter(|e| e.wants(result)) {
        match entry.notifier.notify(&notification.title, &notification.message).await {
            Ok(()) => {
                info!("model={} notifier={} type={} delivered", model, entry.name, entry.notifier.kind());
                delivered += 1;
            }
            Err(e) => warn!("model={} notifier={} delivery failed: {}", model, entry.name, e),
        }
    }
    delivered
}
