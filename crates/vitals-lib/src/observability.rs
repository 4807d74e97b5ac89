//! Observability for the health monitor
//!
//! Provides:
//! - Prometheus metrics (tick latency, failure counters, health score, per-signal gauges)
//! - Event-tagged structured logging with tracing

use crate::models::{HealthTier, Signal, TickResult};
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge_vec, Gauge, GaugeVec, Histogram, IntCounter,
    IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for tick latency (in seconds)
const TICK_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Process-wide metrics, registered on first use
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    tick_latency_seconds: Histogram,
    ticks_total: IntCounter,
    read_failures: IntCounter,
    notification_failures: IntCounter,
    persistence_failures: IntCounter,
    anomalies_detected: IntCounterVec,
    alerts_fired: IntCounterVec,
    density_refits: IntCounter,
    health_score: Gauge,
    signal_value: GaugeVec,
    history_length: IntGaugeVec,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            tick_latency_seconds: register_histogram!(
                "vitals_tick_latency_seconds",
                "Time spent computing one health tick",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            ticks_total: register_int_counter!(
                "vitals_ticks_total",
                "Total number of completed health ticks"
            )
            .expect("Failed to register ticks_total"),

            read_failures: register_int_counter!(
                "vitals_read_failures_total",
                "Total number of failed or timed out metric reads"
            )
            .expect("Failed to register read_failures"),

            notification_failures: register_int_counter!(
                "vitals_notification_failures_total",
                "Total number of alert deliveries that failed"
            )
            .expect("Failed to register notification_failures"),

            persistence_failures: register_int_counter!(
                "vitals_persistence_failures_total",
                "Total number of tick results that could not be persisted"
            )
            .expect("Failed to register persistence_failures"),

            anomalies_detected: register_int_counter_vec!(
                "vitals_anomalies_detected_total",
                "Total number of anomalous readings per signal",
                &["signal"]
            )
            .expect("Failed to register anomalies_detected"),

            alerts_fired: register_int_counter_vec!(
                "vitals_alerts_fired_total",
                "Total number of alerts passed by the debounce gates",
                &["kind"]
            )
            .expect("Failed to register alerts_fired"),

            density_refits: register_int_counter!(
                "vitals_density_refits_total",
                "Total number of density model refits"
            )
            .expect("Failed to register density_refits"),

            health_score: register_gauge!(
                "vitals_health_score",
                "Most recent health score (0-100)"
            )
            .expect("Failed to register health_score"),

            signal_value: register_gauge_vec!(
                "vitals_signal_percent",
                "Most recent reading per signal",
                &["signal"]
            )
            .expect("Failed to register signal_value"),

            history_length: register_int_gauge_vec!(
                "vitals_history_length",
                "Number of readings held per signal history",
                &["signal"]
            )
            .expect("Failed to register history_length"),
        }
    }
}

/// Handle to the process-wide monitor metrics
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn observe_tick_latency(&self, duration_secs: f64) {
        self.inner().tick_latency_seconds.observe(duration_secs);
    }

    /// Record the derived values of a completed tick
    pub fn record_tick(&self, result: &TickResult) {
        let inner = self.inner();
        inner.ticks_total.inc();
        inner.health_score.set(result.health_score as f64);
        for signal in Signal::ALL {
            inner
                .signal_value
                .with_label_values(&[signal.as_str()])
                .set(result.value(signal));
        }
        for signal in &result.anomalous_signals {
            inner
                .anomalies_detected
                .with_label_values(&[signal.as_str()])
                .inc();
        }
    }

    pub fn set_history_length(&self, signal: Signal, len: usize) {
        self.inner()
            .history_length
            .with_label_values(&[signal.as_str()])
            .set(len as i64);
    }

    pub fn inc_read_failures(&self) {
        self.inner().read_failures.inc();
    }

    pub fn inc_notification_failures(&self) {
        self.inner().notification_failures.inc();
    }

    pub fn inc_persistence_failures(&self) {
        self.inner().persistence_failures.inc();
    }

    /// `kind` is either "anomaly" or "tier"
    pub fn inc_alerts_fired(&self, kind: &str) {
        self.inner().alerts_fired.with_label_values(&[kind]).inc();
    }

    pub fn inc_density_refits(&self, count: u64) {
        self.inner().density_refits.inc_by(count);
    }

    pub fn read_failures(&self) -> u64 {
        self.inner().read_failures.get()
    }
}

/// Structured logger for monitor events
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Log a completed tick
    pub fn log_tick(&self, result: &TickResult, elapsed_ms: u128) {
        debug!(
            event = "tick_completed",
            host = %self.host,
            cpu = result.cpu,
            ram = result.ram,
            disk = result.disk,
            network_bytes = result.network_bytes,
            health_score = result.health_score,
            tier = %result.tier,
            anomaly = result.anomaly,
            elapsed_ms = elapsed_ms as u64,
            "Health tick completed"
        );
    }

    /// Log an anomalous reading on one signal
    pub fn log_anomaly(&self, signal: Signal, value: f64, z_score: Option<f64>, density: bool) {
        info!(
            event = "anomaly_detected",
            host = %self.host,
            signal = %signal,
            value = value,
            z_score = ?z_score,
            density_outlier = density,
            "Anomalous reading detected"
        );
    }

    /// Log an alert that passed a debounce gate
    pub fn log_alert(&self, title: &str, tier: HealthTier, health_score: u32) {
        let alarming = tier.is_alarming();
        if alarming {
            warn!(
                event = "alert_fired",
                host = %self.host,
                title = %title,
                tier = %tier,
                health_score = health_score,
                "Alert fired"
            );
        } else {
            info!(
                event = "alert_fired",
                host = %self.host,
                title = %title,
                tier = %tier,
                health_score = health_score,
                "Alert fired"
            );
        }
    }

    /// Log a skipped tick caused by the metric source
    pub fn log_read_failure(&self, error: &dyn std::fmt::Display) {
        warn!(
            event = "read_failed",
            host = %self.host,
            error = %error,
            "Metric read failed, tick skipped"
        );
    }

    pub fn log_startup(&self, version: &str, interval_secs: u64) {
        info!(
            event = "monitor_started",
            host = %self.host,
            version = %version,
            interval_secs = interval_secs,
            "Health monitor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            host = %self.host,
            reason = %reason,
            "Health monitor shutting down"
        );
    }
}
