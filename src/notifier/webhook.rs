//! Generic HTTP webhook notifier.
//!
//! ```yaml
//! notifiers:
//!   ops:
//!     type: webhook
//!     url: https://hooks.example.com/backup
//!     method: POST
//!     headers:
//!       Authorization: Bearer abc
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::json;

use super::{Notifier, NotifierKind};
use crate::config::SubConfig;
use crate::error::{BackrError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(default)]
struct WebhookOptions {
    url: String,
    method: String,
    headers: BTreeMap<String, String>,
}

impl Default for WebhookOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "POST".to_string(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct Webhook {
    client: Client,
    url: String,
    method: Method,
    headers: BTreeMap<String, String>,
}

impl Webhook {
    pub fn from_config(model: &str, name: &str, sub: &SubConfig) -> Result<Self> {
        let field = format!("notifiers.{}", name);
        let options: WebhookOptions = sub
            .options()
            .map_err(|e| BackrError::config(model, field.as_str(), e.to_string()))?;
        if options.url.trim().is_empty() {
            return Err(BackrError::config(model, format!("{}.url", field), "webhook url is required"));
        }
        let method = Method::from_bytes(options.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|e| BackrError::config(model, format!("{}.method", field), e.to_string()))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackrError::Notify(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: options.url.trim().to_string(),
            method,
            headers: options.headers,
        })
    }
}

#[async_trait]
impl Notifier for Webhook {
    fn kind(&self) -> NotifierKind {
        NotifierKind::Webhook
    }

    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .json(&json!({ "title": title, "message": message }));
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackrError::Notify(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackrError::Notify(format!("webhook returned {}: {}", status, body)));
        }
        Ok(())
    }
}
