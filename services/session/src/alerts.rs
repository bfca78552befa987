//! Operator alerts
//!
//! `AlertDispatcher::raise` only enqueues; a delivery task hands every
//! alert to the sink on its own task, so a slow or failing webhook never
//! holds up the state transition that raised it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::AlertingConfig;

/// One operator alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub title: String,
    pub text: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("alert endpoint returned status {0}")]
    Status(u16),

    #[error("alert endpoint rejected message: {0}")]
    Rejected(String),
}

/// Delivery backend for alerts.
#[async_trait]
pub trait AlertSink: Send + Sync + 'static {
    async fn deliver(&self, alert: &Alert) -> Result<(), AlertError>;
}

/// Sink used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn deliver(&self, alert: &Alert) -> Result<(), AlertError> {
        info!(title = %alert.title, text = %alert.text, "Alert (no webhook configured)");
        Ok(())
    }
}

/// Posts markdown messages to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookAlertSink {
    client: Client,
    url: String,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn deliver(&self, alert: &Alert) -> Result<(), AlertError> {
        let payload = json!({
            "msgtype": "markdown",
            "markdown": {
                "title": alert.title,
                "text": alert.text,
            },
        });
        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Status(status.as_u16()));
        }

        // Chat webhooks report failures in the body with a non-zero errcode.
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        match body.get("errcode").and_then(|c| c.as_i64()) {
            Some(code) if code != 0 => {
                let message = body
                    .get("errmsg")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown error")
                    .to_string();
                Err(AlertError::Rejected(message))
            }
            _ => Ok(()),
        }
    }
}

/// Cheap, cloneable handle for raising alerts from the timeline.
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    title: String,
    tx: mpsc::UnboundedSender<Alert>,
}

impl AlertDispatcher {
    /// Dispatcher plus the receiving end of its queue.
    pub fn channel(title: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                title: title.into(),
                tx,
            },
            rx,
        )
    }

    /// Build the configured sink and start delivering.
    pub fn spawn(config: &AlertingConfig) -> Result<(Self, JoinHandle<()>), AlertError> {
        let sink: Arc<dyn AlertSink> = match config.webhook_url.as_deref() {
            Some(url) if !url.is_empty() => Arc::new(WebhookAlertSink::new(
                url,
                Duration::from_millis(config.timeout_ms),
            )?),
            _ => Arc::new(LogAlertSink),
        };
        let (dispatcher, rx) = Self::channel(config.title.clone());
        let handle = tokio::spawn(deliver_alerts(rx, sink));
        Ok((dispatcher, handle))
    }

    /// Queue an alert. Never blocks and never fails the caller.
    pub fn raise(&self, text: impl Into<String>) {
        let alert = Alert {
            title: self.title.clone(),
            text: text.into(),
            raised_at: Utc::now(),
        };
        warn!(title = %alert.title, text = %alert.text, "Alert raised");
        if self.tx.send(alert).is_err() {
            warn!("Alert queue closed, alert dropped");
        }
    }
}

/// Drain the queue, delivering each alert on its own task.
pub async fn deliver_alerts(mut rx: mpsc::UnboundedReceiver<Alert>, sink: Arc<dyn AlertSink>) {
    while let Some(alert) = rx.recv().await {
        let sink = Arc::clone(&sink);
        tokio::spawn(async move {
            if let Err(e) = sink.deliver(&alert).await {
                error!(error = %e, text = %alert.text, "Failed to deliver alert");
            }
        });
    }
}
