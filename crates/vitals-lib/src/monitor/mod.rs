//! The health monitor service
//!
//! [`HealthMonitor`] owns every piece of mutable pipeline state: one
//! detector per signal, the two alert gates and the recent-record cache.
//! It is shared as `Arc<HealthMonitor>` between the sampler task and
//! request handlers; each detector sits behind its own mutex so signals
//! never contend with each other.

mod cache;

#[cfg(test)]
mod tests;

pub use cache::RecordCache;

use crate::alert::{AlertGate, LogNotifier, Notifier, WebhookNotifier};
use crate::anomaly::{AnomalyVerdict, DensityModel, SignalDetector};
use crate::collector::MetricSource;
use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::health::{components, HealthRegistry};
use crate::models::{HealthTier, Reading, Signal, SystemSnapshot, TickResult};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::persist::{JsonLinesLog, PersistentLog};
use crate::scoring::{suggest_fixes, HealthScorer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Title used when the system anomaly flag turns on
pub const ANOMALY_ALERT_TITLE: &str = "Vitals Warning";

/// Both debounce gates, locked together so one tick sees a consistent pair
struct AlertGates {
    anomaly: AlertGate<bool>,
    tier: AlertGate<HealthTier>,
}

/// Per-signal result of one detection pass
struct DetectionOutcome {
    signal: Signal,
    value: f64,
    verdict: AnomalyVerdict,
    history_len: usize,
    refits: u64,
}

/// Continuous host health pipeline
pub struct HealthMonitor {
    source: Arc<dyn MetricSource>,
    detectors: Vec<(Signal, Arc<Mutex<SignalDetector>>)>,
    gates: Mutex<AlertGates>,
    cache: RwLock<RecordCache>,
    scorer: HealthScorer,
    notifier: Arc<dyn Notifier>,
    persistence: Option<Arc<dyn PersistentLog>>,
    read_timeout: Duration,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
    started_at: Instant,
    sampling: AtomicBool,
}

impl HealthMonitor {
    pub fn builder(config: MonitorConfig) -> HealthMonitorBuilder {
        HealthMonitorBuilder::new(config)
    }

    /// Run one sampling tick
    ///
    /// A failed or timed out read returns an error before any history is
    /// touched. Notification and persistence failures are logged and never
    /// fail the tick.
    pub async fn compute_tick(&self) -> Result<TickResult> {
        let started = Instant::now();

        let snapshot = match self.read_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.metrics.inc_read_failures();
                self.logger.log_read_failure(&e);
                self.health
                    .set_degraded(components::METRIC_SOURCE, e.to_string())
                    .await;
                return Err(e);
            }
        };
        self.health.recover(components::METRIC_SOURCE).await;

        let outcomes = self.detect(&snapshot).await?;

        let anomalous_signals: Vec<Signal> = outcomes
            .iter()
            .filter(|outcome| outcome.verdict.is_anomaly())
            .map(|outcome| outcome.signal)
            .collect();
        let anomaly = !anomalous_signals.is_empty();

        for outcome in &outcomes {
            self.metrics
                .set_history_length(outcome.signal, outcome.history_len);
            self.metrics.inc_density_refits(outcome.refits);
            if outcome.verdict.is_anomaly() {
                self.logger.log_anomaly(
                    outcome.signal,
                    outcome.value,
                    outcome.verdict.z_score,
                    outcome.verdict.density,
                );
            }
        }

        let (health_score, tier) =
            self.scorer
                .assess(snapshot.cpu, snapshot.ram, snapshot.disk, anomaly);

        let result = TickResult {
            timestamp: snapshot.timestamp,
            cpu: snapshot.cpu,
            ram: snapshot.ram,
            disk: snapshot.disk,
            network_bytes: snapshot.network_bytes,
            health_score,
            tier,
            anomaly,
            anomalous_signals,
            fixes: suggest_fixes(snapshot.cpu, snapshot.ram, snapshot.disk),
        };

        self.dispatch_alerts(&result).await;

        self.cache.write().await.push(result.clone());

        self.persist(&result).await;

        let elapsed = started.elapsed();
        self.metrics.observe_tick_latency(elapsed.as_secs_f64());
        self.metrics.record_tick(&result);
        self.logger.log_tick(&result, elapsed.as_millis());

        Ok(result)
    }

    /// The last `n` tick results, newest first
    pub async fn recent(&self, n: usize) -> Vec<TickResult> {
        self.cache.read().await.recent(n)
    }

    pub async fn latest(&self) -> Option<TickResult> {
        self.cache.read().await.latest().cloned()
    }

    /// Time since the monitor was built
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether a sampler loop is currently driving this monitor
    pub fn is_sampling(&self) -> bool {
        self.sampling.load(Ordering::SeqCst)
    }

    pub(crate) fn set_sampling(&self, sampling: bool) {
        self.sampling.store(sampling, Ordering::SeqCst);
    }

    /// Current status for a request handler
    ///
    /// With a sampler attached the cached latest result is returned;
    /// otherwise a tick is computed on demand.
    pub async fn status(&self) -> Result<TickResult> {
        if self.is_sampling() {
            if let Some(latest) = self.latest().await {
                return Ok(latest);
            }
        }
        self.compute_tick().await
    }

    /// The last `n` tick results from the persistent log, newest first
    pub async fn persisted(&self, n: usize) -> Result<Vec<TickResult>> {
        let log = self
            .persistence
            .as_ref()
            .ok_or(MonitorError::PersistenceDisabled)?;

        let mut records = log.tail(n).await.map_err(MonitorError::Persistence)?;
        records.reverse();
        Ok(records)
    }

    /// Feed baseline readings into the detector histories without evaluating
    ///
    /// Returns the number of readings accepted. The first non-finite reading
    /// aborts seeding; readings before it stay applied.
    pub async fn seed_baseline(&self, readings: &[Reading]) -> Result<usize> {
        let mut seeded = 0;
        for reading in readings {
            let Some(detector) = self.detector(reading.signal) else {
                continue;
            };
            let mut detector = detector.lock().await;
            detector.warm(reading.value)?;
            self.metrics
                .set_history_length(reading.signal, detector.history().len());
            seeded += 1;
        }

        debug!(seeded = seeded, "Baseline readings seeded");
        Ok(seeded)
    }

    /// Number of readings currently held for `signal`
    pub async fn history_len(&self, signal: Signal) -> usize {
        match self.detector(signal) {
            Some(detector) => detector.lock().await.history().len(),
            None => 0,
        }
    }

    /// Register monitor components and report ready
    pub async fn mark_ready(&self) {
        for name in [components::METRIC_SOURCE, components::NOTIFIER] {
            self.health.register(name).await;
        }
        if self.persistence.is_some() {
            self.health.register(components::PERSISTENCE).await;
        }
        self.health.set_ready(true).await;
    }

    pub fn health_registry(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn metrics(&self) -> &MonitorMetrics {
        &self.metrics
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    fn detector(&self, signal: Signal) -> Option<&Arc<Mutex<SignalDetector>>> {
        self.detectors
            .iter()
            .find(|(s, _)| *s == signal)
            .map(|(_, detector)| detector)
    }

    async fn read_snapshot(&self) -> Result<SystemSnapshot> {
        match tokio::time::timeout(self.read_timeout, self.source.read()).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(e)) => Err(MonitorError::SourceUnavailable(e)),
            Err(_) => Err(MonitorError::SourceTimeout(self.read_timeout)),
        }
    }

    /// Append and evaluate every signal in parallel on the blocking pool
    async fn detect(&self, snapshot: &SystemSnapshot) -> Result<Vec<DetectionOutcome>> {
        // Reject the whole snapshot before any detector is mutated
        for reading in snapshot.readings() {
            if !reading.value.is_finite() {
                return Err(MonitorError::Detection {
                    signal: reading.signal.to_string(),
                    reason: format!("non-finite reading {}", reading.value),
                });
            }
        }

        let tasks: Vec<_> = self
            .detectors
            .iter()
            .map(|(signal, detector)| {
                let signal = *signal;
                let value = signal.value_in(snapshot);
                let detector = Arc::clone(detector);
                let task = tokio::task::spawn_blocking(move || {
                    let mut detector = detector.blocking_lock();
                    let refits_before = detector.refits();
                    let verdict = detector.observe(value)?;
                    Ok::<_, MonitorError>(DetectionOutcome {
                        signal,
                        value,
                        verdict,
                        history_len: detector.history().len(),
                        refits: detector.refits() - refits_before,
                    })
                });
                (signal, task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (signal, task) in tasks {
            let outcome = task.await.map_err(|e| MonitorError::Detection {
                signal: signal.to_string(),
                reason: e.to_string(),
            })??;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn dispatch_alerts(&self, result: &TickResult) {
        let now = Instant::now();
        let (anomaly_fired, tier_fired) = {
            let mut gates = self.gates.lock().await;
            (
                gates.anomaly.check(result.anomaly, now),
                gates.tier.check(result.tier, now),
            )
        };

        if anomaly_fired && result.anomaly {
            let signals: Vec<&str> = result
                .anomalous_signals
                .iter()
                .map(|signal| signal.as_str())
                .collect();
            let message = format!(
                "Unusual system behavior detected on {} (cpu {:.1}%, ram {:.1}%, disk {:.1}%)",
                signals.join(", "),
                result.cpu,
                result.ram,
                result.disk
            );
            self.notify("anomaly", ANOMALY_ALERT_TITLE.to_string(), message, result);
        }

        if tier_fired && result.tier.is_alarming() {
            let title = format!("Health {}", result.tier);
            let message = format!(
                "Health score is {}. {}",
                result.health_score,
                result.fixes.join("; ")
            );
            self.notify("tier", title, message, result);
        }
    }

    /// Deliver one alert in the background; failures are logged, never retried
    fn notify(&self, kind: &str, title: String, message: String, result: &TickResult) {
        self.metrics.inc_alerts_fired(kind);
        self.logger
            .log_alert(&title, result.tier, result.health_score);

        let notifier = Arc::clone(&self.notifier);
        let metrics = self.metrics.clone();
        let health = self.health.clone();
        tokio::spawn(async move {
            match notifier.fire(&title, &message).await {
                Ok(()) => health.recover(components::NOTIFIER).await,
                Err(e) => {
                    metrics.inc_notification_failures();
                    warn!(
                        event = "notification_failed",
                        title = %title,
                        error = %e,
                        "Failed to deliver alert"
                    );
                    health
                        .set_degraded(components::NOTIFIER, e.to_string())
                        .await;
                }
            }
        });
    }

    async fn persist(&self, result: &TickResult) {
        let Some(log) = &self.persistence else {
            return;
        };

        match log.append(result).await {
            Ok(()) => self.health.recover(components::PERSISTENCE).await,
            Err(e) => {
                self.metrics.inc_persistence_failures();
                warn!(
                    event = "persist_failed",
                    timestamp = result.timestamp,
                    error = %e,
                    "Failed to persist tick result"
                );
                self.health
                    .set_degraded(components::PERSISTENCE, e.to_string())
                    .await;
            }
        }
    }
}

/// Builder for [`HealthMonitor`]
pub struct HealthMonitorBuilder {
    config: MonitorConfig,
    source: Option<Arc<dyn MetricSource>>,
    notifier: Option<Arc<dyn Notifier>>,
    persistence: Option<Arc<dyn PersistentLog>>,
    density_models: HashMap<Signal, Box<dyn DensityModel>>,
    health: Option<HealthRegistry>,
    host: String,
}

impl HealthMonitorBuilder {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            source: None,
            notifier: None,
            persistence: None,
            density_models: HashMap::new(),
            health: None,
            host: "localhost".to_string(),
        }
    }

    pub fn source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Overrides the notifier derived from the configuration
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Overrides the persistent log derived from the configuration
    pub fn persistence(mut self, log: Arc<dyn PersistentLog>) -> Self {
        self.persistence = Some(log);
        self
    }

    /// Replace the isolation forest for one signal
    pub fn density_model(mut self, signal: Signal, model: Box<dyn DensityModel>) -> Self {
        self.density_models.insert(signal, model);
        self
    }

    pub fn health_registry(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn build(mut self) -> anyhow::Result<HealthMonitor> {
        let source = self
            .source
            .take()
            .ok_or_else(|| anyhow::anyhow!("Metric source is required"))?;

        let notifier: Arc<dyn Notifier> = match (self.notifier.take(), &self.config.notifier.webhook_url)
        {
            (Some(notifier), _) => notifier,
            (None, Some(url)) => Arc::new(WebhookNotifier::new(url.clone(), self.host.clone())?),
            (None, None) => Arc::new(LogNotifier),
        };

        let persistence = self.persistence.take().or_else(|| {
            self.config
                .persistence
                .path
                .clone()
                .map(|path| Arc::new(JsonLinesLog::new(path)) as Arc<dyn PersistentLog>)
        });

        let anomaly = &self.config.anomaly;
        let detectors = Signal::ALL
            .into_iter()
            .map(|signal| {
                let capacity = self.config.history.capacity_for(signal);
                let detector = match self.density_models.remove(&signal) {
                    Some(model) => {
                        SignalDetector::with_density_model(signal, capacity, anomaly, model)
                    }
                    None => SignalDetector::new(signal, capacity, anomaly),
                };
                (signal, Arc::new(Mutex::new(detector)))
            })
            .collect();

        let cooldown = self.config.alert.cooldown();

        Ok(HealthMonitor {
            source,
            detectors,
            gates: Mutex::new(AlertGates {
                anomaly: AlertGate::new(false, cooldown),
                tier: AlertGate::new(HealthTier::Stable, cooldown),
            }),
            cache: RwLock::new(RecordCache::new(self.config.cache.capacity)),
            scorer: HealthScorer::new(self.config.score),
            notifier,
            persistence,
            read_timeout: self.config.sampler.read_timeout(),
            metrics: MonitorMetrics::new(),
            logger: StructuredLogger::new(self.host),
            health: self.health.unwrap_or_default(),
            started_at: Instant::now(),
            sampling: AtomicBool::new(false),
        })
    }
}
