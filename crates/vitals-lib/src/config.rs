//! Monitor configuration and defaults
//!
//! Every field has a serde default so partial configuration files and
//! environment overrides deserialize cleanly.

use crate::models::Signal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Floor for the metric source read timeout
pub const MIN_READ_TIMEOUT_MS: u64 = 10;

/// Top-level configuration for the monitoring core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub score: ScoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Sampling cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Seconds between ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound on a single metric source read
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Never shorter than [`MIN_READ_TIMEOUT_MS`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(MIN_READ_TIMEOUT_MS))
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

fn default_interval_secs() -> u64 {
    2
}

fn default_read_timeout_ms() -> u64 {
    1000
}

/// Rolling history capacity per signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_cpu_capacity")]
    pub cpu_capacity: usize,
    #[serde(default = "default_ram_capacity")]
    pub ram_capacity: usize,
    #[serde(default = "default_disk_capacity")]
    pub disk_capacity: usize,
}

impl HistoryConfig {
    pub fn capacity_for(&self, signal: Signal) -> usize {
        match signal {
            Signal::Cpu => self.cpu_capacity,
            Signal::Ram => self.ram_capacity,
            Signal::Disk => self.disk_capacity,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            cpu_capacity: default_cpu_capacity(),
            ram_capacity: default_ram_capacity(),
            disk_capacity: default_disk_capacity(),
        }
    }
}

fn default_cpu_capacity() -> usize {
    20
}

fn default_ram_capacity() -> usize {
    50
}

fn default_disk_capacity() -> usize {
    100
}

/// Parameters for both anomaly detection methods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Number of standard deviations a value must exceed
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,
    /// History length before the z-score method activates
    #[serde(default = "default_z_min_history")]
    pub z_min_history: usize,
    /// History length before the density model is trained
    #[serde(default = "default_density_min_history")]
    pub density_min_history: usize,
    /// Assumed fraction of outliers in the training data
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    /// Trees in the isolation forest
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    /// Seed for the forest's random splits
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: default_z_threshold(),
            z_min_history: default_z_min_history(),
            density_min_history: default_density_min_history(),
            contamination: default_contamination(),
            n_trees: default_n_trees(),
            seed: default_seed(),
        }
    }
}

fn default_z_threshold() -> f64 {
    3.0
}

fn default_z_min_history() -> usize {
    10
}

fn default_density_min_history() -> usize {
    20
}

fn default_contamination() -> f64 {
    0.05
}

fn default_n_trees() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

/// Alert debounce settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_cooldown_secs() -> u64 {
    30
}

/// Health score weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    #[serde(default = "default_w_cpu")]
    pub w_cpu: f64,
    #[serde(default = "default_w_ram")]
    pub w_ram: f64,
    #[serde(default = "default_w_disk")]
    pub w_disk: f64,
    #[serde(default = "default_anomaly_penalty")]
    pub anomaly_penalty: f64,
    /// Lowest score the formula may produce
    #[serde(default)]
    pub floor: u32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            w_cpu: default_w_cpu(),
            w_ram: default_w_ram(),
            w_disk: default_w_disk(),
            anomaly_penalty: default_anomaly_penalty(),
            floor: 0,
        }
    }
}

fn default_w_cpu() -> f64 {
    0.3
}

fn default_w_ram() -> f64 {
    0.3
}

fn default_w_disk() -> f64 {
    0.2
}

fn default_anomaly_penalty() -> f64 {
    15.0
}

/// Recent-record cache size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> usize {
    10
}

/// Durable tick log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// JSON-lines file to append tick results to; disabled when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Notification delivery
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Alertmanager-compatible webhook; alerts only go to the log when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.sampler.interval(), Duration::from_secs(2));
        assert_eq!(config.sampler.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.history.capacity_for(Signal::Cpu), 20);
        assert_eq!(config.history.capacity_for(Signal::Disk), 100);
        assert_eq!(config.anomaly.z_threshold, 3.0);
        assert_eq!(config.anomaly.z_min_history, 10);
        assert_eq!(config.anomaly.density_min_history, 20);
        assert_eq!(config.alert.cooldown(), Duration::from_secs(30));
        assert_eq!(config.score.floor, 0);
        assert_eq!(config.cache.capacity, 10);
        assert!(config.persistence.path.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"alert": {"cooldown_secs": 5}, "score": {"floor": 5}}"#;
        let config: MonitorConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.alert.cooldown_secs, 5);
        assert_eq!(config.score.floor, 5);
        assert_eq!(config.score.w_cpu, 0.3);
        assert_eq!(config.sampler.interval_secs, 2);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let sampler = SamplerConfig {
            interval_secs: 0,
            read_timeout_ms: 10,
        };
        assert_eq!(sampler.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_read_timeout_is_clamped() {
        let sampler = SamplerConfig {
            interval_secs: 2,
            read_timeout_ms: 0,
        };
        assert_eq!(
            sampler.read_timeout(),
            Duration::from_millis(MIN_READ_TIMEOUT_MS)
        );

        let sampler = SamplerConfig {
            interval_secs: 2,
            read_timeout_ms: 250,
        };
        assert_eq!(sampler.read_timeout(), Duration::from_millis(250));
    }
}
