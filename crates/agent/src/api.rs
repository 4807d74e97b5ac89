//! HTTP API for probes, Prometheus metrics and monitor status

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use vitals_lib::{ComponentStatus, HealthMonitor, MonitorError, TickResult};

/// Records returned when no limit is given
pub const DEFAULT_RECORD_LIMIT: usize = 10;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<HealthMonitor>,
}

impl AppState {
    pub fn new(monitor: Arc<HealthMonitor>) -> Self {
        Self { monitor }
    }
}

/// Body of `GET /api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub host: String,
    pub uptime_secs: u64,
    /// True when a background sampler produced `latest`
    pub sampling: bool,
    pub latest: TickResult,
}

/// Body of `GET /api/records`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub count: usize,
    /// Newest first
    pub records: Vec<TickResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    pub limit: Option<usize>,
}

/// Maps a monitor error to an HTTP error
struct MonitorFailure(MonitorError);

impl IntoResponse for MonitorFailure {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MonitorError::PersistenceDisabled => StatusCode::NOT_FOUND,
            MonitorError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            e if e.is_read_failure() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(error = %self.0, status = status.as_u16(), "Monitor request failed");

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Liveness: 200 while operational, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.monitor.health_registry().health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.monitor.health_registry().readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Latest cached result while sampling, otherwise a fresh tick
async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, MonitorFailure> {
    let monitor = &state.monitor;
    let latest = monitor.status().await.map_err(MonitorFailure)?;

    Ok(Json(StatusResponse {
        host: monitor.logger().host().to_string(),
        uptime_secs: monitor.uptime().as_secs(),
        sampling: monitor.is_sampling(),
        latest,
    }))
}

async fn records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> Json<RecordsResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_RECORD_LIMIT);
    let records = state.monitor.recent(limit).await;

    Json(RecordsResponse {
        count: records.len(),
        records,
    })
}

/// Tail of the persistent tick log, newest first
async fn log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<RecordsResponse>, MonitorFailure> {
    let limit = query.limit.unwrap_or(DEFAULT_RECORD_LIMIT);
    let records = state
        .monitor
        .persisted(limit)
        .await
        .map_err(MonitorFailure)?;

    Ok(Json(RecordsResponse {
        count: records.len(),
        records,
    }))
}

/// Force one synchronous tick
async fn tick(State(state): State<Arc<AppState>>) -> Result<Json<TickResult>, MonitorFailure> {
    state
        .monitor
        .compute_tick()
        .await
        .map(Json)
        .map_err(MonitorFailure)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/status", get(status))
        .route("/api/records", get(records))
        .route("/api/log", get(log))
        .route("/api/tick", post(tick))
        .with_state(state)
}

/// Serve the API until the listener fails
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
