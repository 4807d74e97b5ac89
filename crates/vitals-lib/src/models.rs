//! Core data models for the health monitor

use serde::{Deserialize, Serialize};
use std::fmt;

/// Percentage signals that each own a rolling history and detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Cpu,
    Ram,
    Disk,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Cpu, Signal::Ram, Signal::Disk];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Cpu => "cpu",
            Signal::Ram => "ram",
            Signal::Disk => "disk",
        }
    }

    /// Pick this signal's value out of a snapshot
    pub fn value_in(&self, snapshot: &SystemSnapshot) -> f64 {
        self.select(snapshot.cpu, snapshot.ram, snapshot.disk)
    }

    fn select(&self, cpu: f64, ram: f64, disk: f64) -> f64 {
        match self {
            Signal::Cpu => cpu,
            Signal::Ram => ram,
            Signal::Disk => disk,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observation of one signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub signal: Signal,
    pub value: f64,
    pub timestamp: i64,
}

impl Reading {
    pub fn new(signal: Signal, value: f64, timestamp: i64) -> Self {
        Self {
            signal,
            value,
            timestamp,
        }
    }
}

/// One read from a metric source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Global CPU usage percentage
    pub cpu: f64,
    /// Used memory percentage
    pub ram: f64,
    /// Used disk space percentage across all mounted disks
    pub disk: f64,
    /// Total bytes received plus transmitted across interfaces
    pub network_bytes: u64,
    /// Unix timestamp in seconds
    pub timestamp: i64,
}

impl SystemSnapshot {
    /// Split the snapshot into per-signal readings
    pub fn readings(&self) -> impl Iterator<Item = Reading> + '_ {
        Signal::ALL
            .into_iter()
            .map(move |signal| Reading::new(signal, signal.value_in(self), self.timestamp))
    }
}

/// Qualitative health tier derived from the health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthTier {
    Stable,
    Warning,
    Critical,
}

impl HealthTier {
    /// Whether entering this tier warrants a notification
    pub fn is_alarming(&self) -> bool {
        !matches!(self, HealthTier::Stable)
    }
}

impl fmt::Display for HealthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthTier::Stable => write!(f, "STABLE"),
            HealthTier::Warning => write!(f, "WARNING"),
            HealthTier::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Result of one sampling tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResult {
    pub timestamp: i64,
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
    pub network_bytes: u64,
    pub health_score: u32,
    pub tier: HealthTier,
    pub anomaly: bool,
    /// Signals whose detector flagged this tick
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalous_signals: Vec<Signal>,
    pub fixes: Vec<String>,
}

impl TickResult {
    /// The reading this tick recorded for `signal`
    pub fn value(&self, signal: Signal) -> f64 {
        signal.select(self.cpu, self.ram, self.disk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_readings_cover_all_signals() {
        let snapshot = SystemSnapshot {
            cpu: 12.5,
            ram: 40.0,
            disk: 71.0,
            network_bytes: 4096,
            timestamp: 1_700_000_000,
        };

        let readings: Vec<Reading> = snapshot.readings().collect();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0], Reading::new(Signal::Cpu, 12.5, 1_700_000_000));
        assert_eq!(readings[1].value, 40.0);
        assert_eq!(readings[2].signal, Signal::Disk);
    }

    #[test]
    fn test_tick_value_matches_signal() {
        let tick = TickResult {
            timestamp: 1_700_000_000,
            cpu: 12.5,
            ram: 40.0,
            disk: 71.0,
            network_bytes: 0,
            health_score: 75,
            tier: HealthTier::Warning,
            anomaly: false,
            anomalous_signals: Vec::new(),
            fixes: Vec::new(),
        };

        assert_eq!(tick.value(Signal::Cpu), 12.5);
        assert_eq!(tick.value(Signal::Ram), 40.0);
        assert_eq!(tick.value(Signal::Disk), 71.0);
    }

    #[test]
    fn test_tier_serializes_uppercase() {
        let json = serde_json::to_string(&HealthTier::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        assert_eq!(HealthTier::Warning.to_string(), "WARNING");
        assert!(!HealthTier::Stable.is_alarming());
    }

    #[test]
    fn test_signal_serializes_lowercase() {
        let json = serde_json::to_string(&Signal::Ram).unwrap();
        assert_eq!(json, "\"ram\"");
        let parsed: Signal = serde_json::from_str("\"disk\"").unwrap();
        assert_eq!(parsed, Signal::Disk);
    }
}
