//! Health scoring
//!
//! A pure weighted formula maps the latest CPU, RAM and disk percentages
//! plus the anomaly flag to an integer score and a qualitative tier.

use crate::config::ScoreConfig;
use crate::models::HealthTier;

/// Score above which the system is stable
pub const STABLE_ABOVE: u32 = 80;

/// Score above which the system is only warning; at or below is critical
pub const WARNING_ABOVE: u32 = 50;

/// Maps resource usage to a bounded health score
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthScorer {
    weights: ScoreConfig,
}

impl HealthScorer {
    pub fn new(weights: ScoreConfig) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreConfig {
        &self.weights
    }

    /// `100 - cpu*w_cpu - ram*w_ram - disk*w_disk - penalty`, clamped to
    /// `[floor, 100]` and truncated
    pub fn score(&self, cpu: f64, ram: f64, disk: f64, anomaly: bool) -> u32 {
        let w = &self.weights;
        let floor = w.floor.min(100);

        let mut score = 100.0;
        score -= cpu * w.w_cpu;
        score -= ram * w.w_ram;
        score -= disk * w.w_disk;
        if anomaly {
            score -= w.anomaly_penalty;
        }

        // f64::max discards NaN, so a bad reading lands on the floor
        score.max(floor as f64).min(100.0) as u32
    }

    /// Score and tier together
    pub fn assess(&self, cpu: f64, ram: f64, disk: f64, anomaly: bool) -> (u32, HealthTier) {
        let score = self.score(cpu, ram, disk, anomaly);
        (score, tier(score))
    }
}

/// Tier for a score: `> 80` stable, `> 50` warning, otherwise critical
pub fn tier(score: u32) -> HealthTier {
    if score > STABLE_ABOVE {
        HealthTier::Stable
    } else if score > WARNING_ABOVE {
        HealthTier::Warning
    } else {
        HealthTier::Critical
    }
}

/// Plain-language remediation hints for the current usage
pub fn suggest_fixes(cpu: f64, ram: f64, disk: f64) -> Vec<String> {
    let mut fixes = Vec::new();

    if cpu > 85.0 {
        fixes.push("Close high CPU background processes".to_string());
    }
    if ram > 80.0 {
        fixes.push("Free RAM or restart the system".to_string());
    }
    if disk > 80.0 {
        fixes.push("Disk usage is high. Clean unnecessary files".to_string());
    }

    if fixes.is_empty() {
        fixes.push("System healthy".to_string());
    }

    fixes
}
