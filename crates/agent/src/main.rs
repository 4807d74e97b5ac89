//! vitals-agent - host health monitoring daemon
//!
//! Samples the local host on a fixed interval, scores its health, raises
//! debounced alerts and serves status over HTTP.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vitals_agent::{api, config::AgentConfig};
use vitals_lib::{HealthMonitor, SamplerLoop, SysinfoSource};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = AgentConfig::load()?;
    info!(
        host = %config.host_name,
        api_port = config.api_port,
        "Agent configured"
    );

    let monitor = Arc::new(
        HealthMonitor::builder(config.monitor.clone())
            .source(Arc::new(SysinfoSource::new()))
            .host(config.host_name.clone())
            .build()
            .context("Failed to build health monitor")?,
    );

    let interval = config.monitor.sampler.interval();
    monitor
        .logger()
        .log_startup(AGENT_VERSION, interval.as_secs());
    monitor.mark_ready().await;

    let sampler = SamplerLoop::spawn(Arc::clone(&monitor), interval);

    let state = Arc::new(api::AppState::new(Arc::clone(&monitor)));
    let mut api_handle = tokio::spawn(api::serve(config.api_port, state));

    let reason = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            "SIGINT received"
        }
        served = &mut api_handle => {
            match served {
                Ok(Ok(())) => "API server stopped",
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    "API server failed"
                }
                Err(e) => {
                    error!(error = %e, "API server task panicked");
                    "API server task panicked"
                }
            }
        }
    };

    monitor.logger().log_shutdown(reason);
    monitor.health_registry().set_ready(false).await;
    sampler.stop().await;
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
