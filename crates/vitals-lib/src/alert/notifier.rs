//! Alert delivery collaborators
//!
//! Handles:
//! - The `Notifier` seam the monitor fires alerts through
//! - Logging-only delivery for headless installs
//! - Alertmanager-compatible webhook delivery

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Timeout for a single webhook delivery
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort alert sink
///
/// Callers treat delivery as fire-and-forget: errors are logged by the
/// caller and never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn fire(&self, title: &str, message: &str) -> Result<()>;
}

/// Notifier that only writes alerts to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn fire(&self, title: &str, message: &str) -> Result<()> {
        warn!(event = "alert", title = %title, message = %message, "Health alert");
        Ok(())
    }
}

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Alertmanager webhook alert format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerAlert {
    /// Alert status (firing or resolved)
    pub status: String,
    /// Alert labels for routing and grouping
    pub labels: HashMap<String, String>,
    /// Alert annotations with details
    pub annotations: HashMap<String, String>,
    /// Start time in RFC3339 format
    pub starts_at: String,
}

/// Alertmanager webhook payload (array of alerts)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertmanagerPayload {
    pub alerts: Vec<AlertmanagerAlert>,
}

/// Posts alerts to an Alertmanager-compatible webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    host: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, host: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("Failed to create webhook client")?;

        Ok(Self {
            client,
            url: url.into(),
            host: host.into(),
        })
    }

    /// Build the payload for one alert
    pub fn payload(&self, title: &str, message: &str, timestamp: &str) -> AlertmanagerPayload {
        let severity = severity_for(title);

        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), "HostHealthDegraded".to_string());
        labels.insert("severity".to_string(), severity.to_string());
        labels.insert("host".to_string(), self.host.clone());

        let mut annotations = HashMap::new();
        annotations.insert("summary".to_string(), title.to_string());
        annotations.insert("description".to_string(), message.to_string());

        AlertmanagerPayload {
            alerts: vec![AlertmanagerAlert {
                status: "firing".to_string(),
                labels,
                annotations,
                starts_at: timestamp.to_string(),
            }],
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn fire(&self, title: &str, message: &str) -> Result<()> {
        let payload = self.payload(title, message, &chrono::Utc::now().to_rfc3339());

        let response = self
            .client
            .post(&self.url)
            .json(&payload.alerts)
            .send()
            .await
            .context("Failed to send webhook")?;

        if !response.status().is_success() {
            anyhow::bail!("Webhook rejected alert ({})", response.status());
        }

        Ok(())
    }
}

/// Critical-tier titles map to critical severity, everything else warns
fn severity_for(title: &str) -> AlertSeverity {
    if title.to_ascii_uppercase().contains("CRITICAL") {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    }
}
