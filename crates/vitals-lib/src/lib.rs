//! Host health monitoring core
//!
//! This crate provides:
//! - Host metric sources and a background sampler
//! - Rolling per-signal anomaly detection (z-score and isolation forest)
//! - Deterministic health scoring with remediation hints
//! - Debounced alert delivery and an optional durable tick log
//! - Health checks and observability

pub mod alert;
pub mod anomaly;
pub mod collector;
pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod persist;
pub mod scoring;

pub use collector::{MetricSource, SamplerHandle, SamplerLoop, SysinfoSource};
pub use config::MonitorConfig;
pub use error::MonitorError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use monitor::{HealthMonitor, HealthMonitorBuilder};
pub use observability::{MonitorMetrics, StructuredLogger};
