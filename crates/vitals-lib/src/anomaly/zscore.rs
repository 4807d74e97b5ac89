//! Z-score outlier detection
//!
//! Flags a value lying more than a configured number of population standard
//! deviations from the mean of a signal's rolling history. Statistics are
//! re-derived on every call; nothing is fitted or persisted.

use super::RollingHistory;

/// Default number of standard deviations considered anomalous
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Default minimum history before detection activates
pub const DEFAULT_MIN_HISTORY: usize = 10;

/// Detects values outside `threshold` standard deviations
#[derive(Debug, Clone)]
pub struct ZScoreDetector {
    /// Number of standard deviations to consider an anomaly
    pub threshold: f64,
    /// Minimum history length before detection activates
    pub min_history: usize,
}

impl ZScoreDetector {
    pub fn new(threshold: f64, min_history: usize) -> Self {
        Self {
            threshold,
            min_history,
        }
    }

    /// Evaluate `current` against the statistics of `history`
    ///
    /// # Returns
    /// * `Some(ZScoreAnomaly)` if `|current - mean| / std` is strictly above the threshold
    /// * `None` for short histories, zero variance, or values within range
    pub fn detect(&self, current: f64, history: &RollingHistory) -> Option<ZScoreAnomaly> {
        if history.len() < self.min_history {
            return None;
        }

        let (mean, std_dev) = history.mean_std()?;

        // A flat series has no outliers
        if std_dev == 0.0 {
            return None;
        }

        let z_score = (current - mean).abs() / std_dev;

        if z_score > self.threshold {
            Some(ZScoreAnomaly {
                value: current,
                mean,
                std_dev,
                z_score,
                threshold: self.threshold,
            })
        } else {
            None
        }
    }
}

impl Default for ZScoreDetector {
    fn default() -> Self {
        Self::new(DEFAULT_Z_THRESHOLD, DEFAULT_MIN_HISTORY)
    }
}

/// Details of a z-score outlier
#[derive(Debug, Clone)]
pub struct ZScoreAnomaly {
    pub value: f64,
    pub mean: f64,
    pub std_dev: f64,
    /// Absolute number of standard deviations from the mean
    pub z_score: f64,
    pub threshold: f64,
}

impl ZScoreAnomaly {
    /// Whether the outlier lies above the mean
    pub fn is_spike(&self) -> bool {
        self.value > self.mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Alternating 40/60 gives mean 50 and population std 10
    fn alternating_history() -> RollingHistory {
        let mut history = RollingHistory::new(100);
        for i in 0..40 {
            history.append(if i % 2 == 0 { 40.0 } else { 60.0 });
        }
        history
    }

    #[test]
    fn test_constant_history_never_flags() {
        let detector = ZScoreDetector::default();
        let mut history = RollingHistory::new(20);
        for _ in 0..20 {
            history.append(42.0);
        }

        assert!(detector.detect(42.0, &history).is_none());
        assert!(detector.detect(99.0, &history).is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        let detector = ZScoreDetector::default();
        let history = alternating_history();

        let above = detector.detect(50.0 + 3.0001 * 10.0, &history);
        assert!(above.is_some());
        assert!(above.unwrap().z_score > 3.0);

        assert!(detector.detect(50.0 + 2.9999 * 10.0, &history).is_none());
    }

    #[test]
    fn test_detects_drops_below_mean() {
        let detector = ZScoreDetector::default();
        let history = alternating_history();

        let anomaly = detector.detect(50.0 - 3.5 * 10.0, &history).unwrap();
        assert!(!anomaly.is_spike());
        assert!((anomaly.z_score - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_history() {
        let detector = ZScoreDetector::default();
        let mut history = RollingHistory::new(20);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            history.append(v);
        }

        assert!(detector.detect(500.0, &history).is_none());
    }
}
