use super::*;
use crate::config::{MonitorConfig, SamplerConfig};
use crate::health::ComponentStatus;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use tempfile::TempDir;
use tokio::sync::mpsc;

enum Step {
    Reading(f64, f64, f64),
    Fail,
    Stall(Duration),
}

/// Plays back a script of reads, then repeats the fallback reading
struct ScriptedSource {
    steps: std::sync::Mutex<VecDeque<Step>>,
    fallback: (f64, f64, f64),
    reads: AtomicUsize,
}

impl ScriptedSource {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Self::with_fallback(steps, (15.0, 30.0, 10.0))
    }

    fn with_fallback(steps: Vec<Step>, fallback: (f64, f64, f64)) -> Arc<Self> {
        Arc::new(Self {
            steps: std::sync::Mutex::new(steps.into()),
            fallback,
            reads: AtomicUsize::new(0),
        })
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    async fn read(&self) -> anyhow::Result<SystemSnapshot> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        let (cpu, ram, disk) = match step {
            Some(Step::Reading(cpu, ram, disk)) => (cpu, ram, disk),
            Some(Step::Fail) => anyhow::bail!("sensor offline"),
            Some(Step::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                self.fallback
            }
            None => self.fallback,
        };
        Ok(SystemSnapshot {
            cpu,
            ram,
            disk,
            network_bytes: 4096,
            timestamp: 1_700_000_000 + n as i64,
        })
    }
}

/// Forwards every alert into a channel
struct ChannelNotifier {
    tx: mpsc::UnboundedSender<(String, String)>,
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn fire(&self, title: &str, message: &str) -> anyhow::Result<()> {
        let _ = self.tx.send((title.to_string(), message.to_string()));
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn fire(&self, _title: &str, _message: &str) -> anyhow::Result<()> {
        anyhow::bail!("smtp relay refused connection")
    }
}

struct FailingLog;

#[async_trait]
impl PersistentLog for FailingLog {
    async fn append(&self, _record: &TickResult) -> anyhow::Result<()> {
        anyhow::bail!("read-only filesystem")
    }

    async fn tail(&self, _n: usize) -> anyhow::Result<Vec<TickResult>> {
        anyhow::bail!("read-only filesystem")
    }
}

fn channel_notifier() -> (Arc<ChannelNotifier>, mpsc::UnboundedReceiver<(String, String)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelNotifier { tx }), rx)
}

async fn drain(rx: &mut mpsc::UnboundedReceiver<(String, String)>) -> Vec<(String, String)> {
    let mut alerts = Vec::new();
    while let Ok(Some(alert)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        alerts.push(alert);
    }
    alerts
}

async fn wait_for_status(monitor: &HealthMonitor, component: &str, status: ComponentStatus) {
    for _ in 0..50 {
        if let Some(health) = monitor.health_registry().component(component).await {
            if health.status == status {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{component} never became {status:?}");
}

#[tokio::test]
async fn test_baseline_spike_and_recovery() {
    let mut steps: Vec<Step> = (0..25).map(|_| Step::Reading(15.0, 30.0, 10.0)).collect();
    steps.push(Step::Reading(95.0, 30.0, 10.0));
    let source = ScriptedSource::new(steps);
    let (notifier, mut alerts) = channel_notifier();

    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(source)
        .notifier(notifier)
        .build()
        .unwrap();

    for tick in 1..=25 {
        let result = monitor.compute_tick().await.unwrap();
        assert!(!result.anomaly, "tick {tick} flagged");
        assert_eq!(result.health_score, 84);
        assert_eq!(result.tier, HealthTier::Stable);
        assert_eq!(monitor.recent(100).await.len(), tick.min(10));
    }
    assert!(drain(&mut alerts).await.is_empty());

    let spike = monitor.compute_tick().await.unwrap();
    assert!(spike.anomaly);
    assert_eq!(spike.anomalous_signals, vec![Signal::Cpu]);
    assert_eq!(spike.health_score, 45);
    assert_eq!(spike.tier, HealthTier::Critical);
    assert!(spike
        .fixes
        .contains(&"Close high CPU background processes".to_string()));

    let recovered = monitor.compute_tick().await.unwrap();
    assert!(!recovered.anomaly);
    assert_eq!(recovered.tier, HealthTier::Stable);

    assert_eq!(monitor.recent(100).await.len(), 10);
    assert_eq!(monitor.history_len(Signal::Cpu).await, 20);
    assert_eq!(monitor.history_len(Signal::Ram).await, 27);
    assert_eq!(monitor.history_len(Signal::Disk).await, 27);

    // spike fires both gates once; the recovery lands inside the cooldown
    let fired = drain(&mut alerts).await;
    let titles: Vec<&str> = fired.iter().map(|(title, _)| title.as_str()).collect();
    assert_eq!(fired.len(), 2);
    assert!(titles.contains(&ANOMALY_ALERT_TITLE));
    assert!(titles.contains(&"Health CRITICAL"));
}

#[tokio::test]
async fn test_recent_is_newest_first() {
    let source = ScriptedSource::new(vec![
        Step::Reading(10.0, 10.0, 10.0),
        Step::Reading(20.0, 20.0, 20.0),
        Step::Reading(30.0, 30.0, 30.0),
    ]);
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(source)
        .build()
        .unwrap();

    for _ in 0..3 {
        monitor.compute_tick().await.unwrap();
    }

    let cpus: Vec<f64> = monitor.recent(2).await.iter().map(|r| r.cpu).collect();
    assert_eq!(cpus, vec![30.0, 20.0]);
    assert_eq!(monitor.latest().await.unwrap().cpu, 30.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ticks_keep_every_append() {
    const TICKS: usize = 8;
    let source = ScriptedSource::new(Vec::new());
    let monitor = Arc::new(
        HealthMonitor::builder(MonitorConfig::default())
            .source(source.clone())
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..TICKS)
        .map(|_| {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move { monitor.compute_tick().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(source.reads(), TICKS);
    for signal in Signal::ALL {
        assert_eq!(monitor.history_len(signal).await, TICKS, "{signal} lost an append");
    }

    let cached = monitor.recent(100).await;
    assert_eq!(cached.len(), TICKS);
    let timestamps: std::collections::HashSet<i64> =
        cached.iter().map(|tick| tick.timestamp).collect();
    assert_eq!(timestamps.len(), TICKS);
}

#[tokio::test]
async fn test_read_failure_leaves_history_untouched() {
    let source = ScriptedSource::new(vec![Step::Reading(15.0, 30.0, 10.0), Step::Fail]);
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(source)
        .build()
        .unwrap();

    monitor.compute_tick().await.unwrap();
    let err = monitor.compute_tick().await.unwrap_err();

    assert!(matches!(err, MonitorError::SourceUnavailable(_)));
    assert!(err.is_read_failure());
    for signal in Signal::ALL {
        assert_eq!(monitor.history_len(signal).await, 1);
    }
    assert_eq!(monitor.recent(10).await.len(), 1);

    let source_health = monitor
        .health_registry()
        .component(components::METRIC_SOURCE)
        .await
        .unwrap();
    assert_eq!(source_health.status, ComponentStatus::Degraded);

    // the next good read recovers the component
    monitor.compute_tick().await.unwrap();
    wait_for_status(&monitor, components::METRIC_SOURCE, ComponentStatus::Healthy).await;
}

#[tokio::test]
async fn test_slow_read_times_out() {
    let source = ScriptedSource::new(vec![Step::Stall(Duration::from_millis(500))]);
    let config = MonitorConfig {
        sampler: SamplerConfig {
            read_timeout_ms: 50,
            ..SamplerConfig::default()
        },
        ..MonitorConfig::default()
    };
    let monitor = HealthMonitor::builder(config)
        .source(source)
        .build()
        .unwrap();

    let err = monitor.compute_tick().await.unwrap_err();
    assert!(matches!(err, MonitorError::SourceTimeout(d) if d == Duration::from_millis(50)));
    assert_eq!(monitor.history_len(Signal::Cpu).await, 0);
}

#[tokio::test]
async fn test_non_finite_snapshot_is_rejected_whole() {
    let source = ScriptedSource::new(vec![Step::Reading(20.0, 40.0, f64::NAN)]);
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(source)
        .build()
        .unwrap();

    let err = monitor.compute_tick().await.unwrap_err();
    assert!(matches!(err, MonitorError::Detection { ref signal, .. } if signal == "disk"));
    for signal in Signal::ALL {
        assert_eq!(monitor.history_len(signal).await, 0);
    }
    assert!(monitor.latest().await.is_none());
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_tick() {
    let source = ScriptedSource::with_fallback(Vec::new(), (90.0, 90.0, 90.0));
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(source)
        .notifier(Arc::new(FailingNotifier))
        .build()
        .unwrap();

    let result = monitor.compute_tick().await.unwrap();
    assert_eq!(result.tier, HealthTier::Critical);
    assert_eq!(monitor.recent(10).await.len(), 1);

    wait_for_status(&monitor, components::NOTIFIER, ComponentStatus::Degraded).await;
}

#[tokio::test]
async fn test_persistence_failure_does_not_affect_cache() {
    let source = ScriptedSource::new(Vec::new());
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(source)
        .persistence(Arc::new(FailingLog))
        .build()
        .unwrap();

    let result = monitor.compute_tick().await.unwrap();
    assert_eq!(monitor.latest().await, Some(result));

    let persistence = monitor
        .health_registry()
        .component(components::PERSISTENCE)
        .await
        .unwrap();
    assert_eq!(persistence.status, ComponentStatus::Degraded);
}

#[tokio::test]
async fn test_ticks_are_persisted_from_config_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ticks.jsonl");
    let mut config = MonitorConfig::default();
    config.persistence.path = Some(path.clone());

    let monitor = HealthMonitor::builder(config)
        .source(ScriptedSource::new(Vec::new()))
        .build()
        .unwrap();
    let first = monitor.compute_tick().await.unwrap();
    let second = monitor.compute_tick().await.unwrap();

    let stored = JsonLinesLog::new(path).tail(10).await.unwrap();
    assert_eq!(stored, vec![first.clone(), second.clone()]);

    assert_eq!(monitor.persisted(10).await.unwrap(), vec![second.clone(), first]);
    assert_eq!(monitor.persisted(1).await.unwrap(), vec![second]);
}

#[tokio::test]
async fn test_persisted_requires_a_log() {
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(ScriptedSource::new(Vec::new()))
        .build()
        .unwrap();

    assert!(matches!(
        monitor.persisted(5).await,
        Err(MonitorError::PersistenceDisabled)
    ));
}

#[tokio::test]
async fn test_unreadable_log_is_reported() {
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(ScriptedSource::new(Vec::new()))
        .persistence(Arc::new(FailingLog))
        .build()
        .unwrap();

    let err = monitor.persisted(5).await.unwrap_err();
    assert!(matches!(err, MonitorError::Persistence(_)));
    assert!(!err.is_read_failure());
}

#[tokio::test]
async fn test_status_pulls_without_sampler_and_reads_cache_with_one() {
    let source = ScriptedSource::new(Vec::new());
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(source.clone())
        .build()
        .unwrap();

    monitor.status().await.unwrap();
    monitor.status().await.unwrap();
    assert_eq!(source.reads(), 2);

    monitor.set_sampling(true);
    let cached = monitor.status().await.unwrap();
    assert_eq!(source.reads(), 2);
    assert_eq!(Some(cached), monitor.latest().await);
}

#[tokio::test]
async fn test_seeded_baseline_arms_detection_immediately() {
    let source = ScriptedSource::new(vec![Step::Reading(95.0, 30.0, 10.0)]);
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(source)
        .build()
        .unwrap();

    let baseline: Vec<Reading> = (0..25)
        .flat_map(|i| {
            [
                Reading::new(Signal::Cpu, 15.0, i),
                Reading::new(Signal::Ram, 30.0, i),
                Reading::new(Signal::Disk, 10.0, i),
            ]
        })
        .collect();
    assert_eq!(monitor.seed_baseline(&baseline).await.unwrap(), 75);
    assert_eq!(monitor.history_len(Signal::Cpu).await, 20);
    assert_eq!(monitor.history_len(Signal::Ram).await, 25);
    assert!(monitor.recent(10).await.is_empty());

    let result = monitor.compute_tick().await.unwrap();
    assert!(result.anomaly);
    assert_eq!(result.anomalous_signals, vec![Signal::Cpu]);
}

#[tokio::test]
async fn test_seed_baseline_rejects_non_finite() {
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(ScriptedSource::new(Vec::new()))
        .build()
        .unwrap();

    let readings = [
        Reading::new(Signal::Ram, 50.0, 1),
        Reading::new(Signal::Ram, f64::INFINITY, 2),
    ];
    assert!(monitor.seed_baseline(&readings).await.is_err());
    assert_eq!(monitor.history_len(Signal::Ram).await, 1);
}

#[tokio::test]
async fn test_mark_ready_registers_components() {
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(ScriptedSource::new(Vec::new()))
        .build()
        .unwrap();

    assert!(!monitor.health_registry().readiness().await.ready);
    monitor.mark_ready().await;

    let readiness = monitor.health_registry().readiness().await;
    assert!(readiness.ready);
    let health = monitor.health_registry().health().await;
    assert!(health.components.contains_key(components::METRIC_SOURCE));
    assert!(!health.components.contains_key(components::PERSISTENCE));
}

#[test]
fn test_builder_requires_source() {
    assert!(HealthMonitor::builder(MonitorConfig::default())
        .build()
        .is_err());
}

#[tokio::test]
async fn test_uptime_advances() {
    let monitor = HealthMonitor::builder(MonitorConfig::default())
        .source(ScriptedSource::new(Vec::new()))
        .build()
        .unwrap();

    let before = monitor.uptime();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(monitor.uptime() > before);
}
