//! Per-signal anomaly detector combining z-score and density methods

use super::{DensityModel, IsolationForest, RollingHistory, ZScoreDetector};
use crate::config::AnomalyConfig;
use crate::error::{MonitorError, Result};
use crate::models::Signal;

/// Outcome of evaluating one new value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnomalyVerdict {
    /// The z-score method flagged the value
    pub zscore: bool,
    /// The density model flagged the value
    pub density: bool,
    /// Absolute z-score when the statistical method was active
    pub z_score: Option<f64>,
}

impl AnomalyVerdict {
    pub fn is_anomaly(&self) -> bool {
        self.zscore || self.density
    }
}

/// Owns one signal's rolling history and evaluates new readings against it
pub struct SignalDetector {
    signal: Signal,
    history: RollingHistory,
    zscore: ZScoreDetector,
    density: Box<dyn DensityModel>,
    density_min_history: usize,
    refits: u64,
}

impl SignalDetector {
    /// Create a detector backed by an isolation forest
    pub fn new(signal: Signal, capacity: usize, config: &AnomalyConfig) -> Self {
        // Distinct seeds keep the per-signal forests independent
        let seed = config.seed.wrapping_add(signal as u64);
        let forest = IsolationForest::new(config.n_trees, config.contamination, seed);
        Self::with_density_model(signal, capacity, config, Box::new(forest))
    }

    /// Create a detector with a caller-supplied density model
    pub fn with_density_model(
        signal: Signal,
        capacity: usize,
        config: &AnomalyConfig,
        density: Box<dyn DensityModel>,
    ) -> Self {
        Self {
            signal,
            history: RollingHistory::new(capacity),
            zscore: ZScoreDetector::new(config.z_threshold, config.z_min_history),
            density,
            density_min_history: config.density_min_history,
            refits: 0,
        }
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    /// Number of density model refits performed so far
    pub fn refits(&self) -> u64 {
        self.refits
    }

    /// Append `value` to the history, then evaluate it
    ///
    /// The newest value is part of the statistics it is judged against.
    /// Once the history reaches the density minimum the model is refit on
    /// the full history before classifying. Non-finite values are
    /// rejected and leave the history untouched.
    pub fn observe(&mut self, value: f64) -> Result<AnomalyVerdict> {
        self.check_finite(value)?;
        self.history.append(value);
        Ok(self.evaluate(value))
    }

    /// Append without evaluating, used to seed a baseline
    pub fn warm(&mut self, value: f64) -> Result<()> {
        self.check_finite(value)?;
        self.history.append(value);
        Ok(())
    }

    fn check_finite(&self, value: f64) -> Result<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(MonitorError::Detection {
                signal: self.signal.to_string(),
                reason: format!("non-finite reading {value}"),
            })
        }
    }

    fn evaluate(&mut self, value: f64) -> AnomalyVerdict {
        let z = self.zscore.detect(value, &self.history);
        let z_active = self.history.len() >= self.zscore.min_history;

        let density = if self.history.len() >= self.density_min_history {
            self.density.fit(&self.history.as_sequence());
            self.refits += 1;
            self.density.is_outlier(value)
        } else {
            false
        };

        let z_score = match (&z, z_active) {
            (Some(anomaly), _) => Some(anomaly.z_score),
            (None, true) => self
                .history
                .mean_std()
                .filter(|(_, std)| *std > 0.0)
                .map(|(mean, std)| (value - mean).abs() / std),
            (None, false) => None,
        };

        AnomalyVerdict {
            zscore: z.is_some(),
            density,
            z_score,
        }
    }
}
