//! API client for the vitals agent

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for a running `vitals-agent`
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to reach the vitals agent")?;

        decode(response, false).await
    }

    /// Make a POST request without a body
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .send()
            .await
            .context("Failed to reach the vitals agent")?;

        decode(response, false).await
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        self.get("api/status").await
    }

    pub async fn records(&self, limit: usize) -> Result<RecordsResponse> {
        self.get(&format!("api/records?limit={limit}")).await
    }

    /// Tail of the agent's persistent tick log, newest first
    pub async fn log(&self, limit: usize) -> Result<RecordsResponse> {
        self.get(&format!("api/log?limit={limit}")).await
    }

    pub async fn tick(&self) -> Result<TickRecord> {
        self.post("api/tick").await
    }

    /// Liveness report; a 503 still carries the component breakdown
    pub async fn health(&self) -> Result<HealthReport> {
        let url = self.base_url.join("healthz").context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to reach the vitals agent")?;

        decode(response, true).await
    }

    pub async fn readiness(&self) -> Result<Readiness> {
        let url = self.base_url.join("readyz").context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to reach the vitals agent")?;

        decode(response, true).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, allow_unavailable: bool) -> Result<T> {
    let status = response.status();
    let accepted =
        status.is_success() || (allow_unavailable && status == StatusCode::SERVICE_UNAVAILABLE);

    if !accepted {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        anyhow::bail!("API error ({}): {}", status, message);
    }

    response.json().await.context("Failed to parse response")
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

/// One tick result as served by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub timestamp: i64,
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
    pub network_bytes: u64,
    pub health_score: u32,
    pub tier: String,
    pub anomaly: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalous_signals: Vec<String>,
    #[serde(default)]
    pub fixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub host: String,
    pub uptime_secs: u64,
    pub sampling: bool,
    pub latest: TickRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub count: usize,
    pub records: Vec<TickRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub components: BTreeMap<String, ComponentReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
