//! Background sampling loop
//!
//! Drives [`HealthMonitor::compute_tick`] on a fixed interval. Nothing runs
//! until [`SamplerLoop::spawn`] is called, and the loop only ends through
//! [`SamplerHandle::stop`]. A tick in progress always runs to completion.

use crate::health::components;
use crate::monitor::HealthMonitor;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default time between ticks
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Consecutive failed ticks before the sampler reports itself unhealthy
const UNHEALTHY_AFTER: u32 = 5;

/// Periodic driver for a [`HealthMonitor`]
pub struct SamplerLoop {
    monitor: Arc<HealthMonitor>,
    interval: Duration,
}

impl SamplerLoop {
    /// Start sampling `monitor` every `interval`
    pub fn spawn(monitor: Arc<HealthMonitor>, interval: Duration) -> SamplerHandle {
        let interval = interval.max(MIN_INTERVAL);
        Self { monitor, interval }.start()
    }

    fn start(self) -> SamplerHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let monitor = Arc::clone(&self.monitor);

        monitor.set_sampling(true);
        let task = tokio::spawn(self.run(shutdown_rx));

        SamplerHandle {
            shutdown_tx,
            task: Some(task),
            monitor,
        }
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Starting sampler loop"
        );

        let health = self.monitor.health_registry().clone();
        health.register(components::SAMPLER).await;

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tick_count = 0u64;
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let start = Instant::now();
                    tick_count += 1;

                    match self.monitor.compute_tick().await {
                        Ok(result) => {
                            if consecutive_failures > 0 {
                                info!(
                                    failed_ticks = consecutive_failures,
                                    "Sampler recovered"
                                );
                                health.recover(components::SAMPLER).await;
                            }
                            consecutive_failures = 0;

                            // roughly once a minute at the default interval
                            if tick_count % 30 == 0 {
                                debug!(
                                    ticks = tick_count,
                                    health_score = result.health_score,
                                    elapsed_ms = start.elapsed().as_millis() as u64,
                                    "Sampler progress"
                                );
                            }
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            warn!(
                                error = %e,
                                consecutive_failures = consecutive_failures,
                                "Tick failed, continuing"
                            );
                            if consecutive_failures >= UNHEALTHY_AFTER {
                                health
                                    .set_unhealthy(
                                        components::SAMPLER,
                                        format!("{consecutive_failures} consecutive ticks failed"),
                                    )
                                    .await;
                            } else {
                                health.set_degraded(components::SAMPLER, e.to_string()).await;
                            }
                        }
                    }
                }
                // also resolves once every handle is dropped
                _ = shutdown.recv() => {
                    info!(ticks = tick_count, "Shutting down sampler loop");
                    break;
                }
            }
        }

        self.monitor.set_sampling(false);
    }
}

/// Handle to a running sampler
pub struct SamplerHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
    monitor: Arc<HealthMonitor>,
}

impl SamplerHandle {
    /// Signal the loop to stop and wait for the current tick to finish
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Sampler task ended abnormally");
            }
        }
        self.monitor.set_sampling(false);
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

/// Builder for a [`SamplerLoop`]
pub struct SamplerLoopBuilder {
    monitor: Option<Arc<HealthMonitor>>,
    interval: Duration,
}

impl SamplerLoopBuilder {
    pub fn new() -> Self {
        Self {
            monitor: None,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn monitor(mut self, monitor: Arc<HealthMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// A zero interval is raised to one millisecond
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Start the loop
    pub fn spawn(self) -> Result<SamplerHandle> {
        let monitor = self
            .monitor
            .ok_or_else(|| anyhow::anyhow!("Monitor is required"))?;

        Ok(SamplerLoop::spawn(monitor, self.interval))
    }
}

impl Default for SamplerLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MetricSource;
    use crate::config::MonitorConfig;
    use crate::health::ComponentStatus;
    use crate::models::SystemSnapshot;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        reads: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl MetricSource for CountingSource {
        async fn read(&self) -> Result<SystemSnapshot> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("sensor offline");
            }
            Ok(SystemSnapshot {
                cpu: 12.0,
                ram: 40.0,
                disk: 55.0,
                network_bytes: 2048,
                timestamp: chrono::Utc::now().timestamp(),
            })
        }
    }

    fn monitor(fail: bool) -> (Arc<HealthMonitor>, Arc<CountingSource>) {
        let source = Arc::new(CountingSource {
            reads: AtomicUsize::new(0),
            fail,
        });
        let monitor = HealthMonitor::builder(MonitorConfig::default())
            .source(source.clone())
            .build()
            .unwrap();
        (Arc::new(monitor), source)
    }

    #[test]
    fn test_builder_requires_monitor() {
        assert!(SamplerLoopBuilder::new().spawn().is_err());
    }

    #[tokio::test]
    async fn test_nothing_samples_before_spawn() {
        let (monitor, source) = monitor(false);
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!monitor.is_sampling());
        assert_eq!(source.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spawn_ticks_until_stopped() {
        let (monitor, source) = monitor(false);

        let handle = SamplerLoopBuilder::new()
            .monitor(monitor.clone())
            .interval(Duration::from_millis(10))
            .spawn()
            .unwrap();
        assert!(monitor.is_sampling());
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.stop().await;

        let reads = source.reads.load(Ordering::SeqCst);
        assert!(reads >= 2);
        assert!(!monitor.is_sampling());
        assert!(!monitor.recent(10).await.is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.reads.load(Ordering::SeqCst), reads);
    }

    #[tokio::test]
    async fn test_dropped_handle_falls_back_to_on_demand() {
        let (monitor, source) = monitor(false);

        let handle = SamplerLoop::spawn(monitor.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!monitor.is_sampling());

        let reads = source.reads.load(Ordering::SeqCst);
        monitor.status().await.unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), reads + 1);
    }

    #[tokio::test]
    async fn test_failing_ticks_keep_loop_alive() {
        let (monitor, source) = monitor(true);

        let handle = SamplerLoop::spawn(monitor.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_running());
        handle.stop().await;

        assert!(source.reads.load(Ordering::SeqCst) >= UNHEALTHY_AFTER as usize);
        assert!(monitor.recent(10).await.is_empty());

        let sampler = monitor
            .health_registry()
            .component(components::SAMPLER)
            .await
            .unwrap();
        assert_eq!(sampler.status, ComponentStatus::Unhealthy);
    }
}
