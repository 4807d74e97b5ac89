//! Anomaly detection over rolling signal histories
//!
//! This module provides:
//! - Fixed-capacity rolling histories per signal
//! - Z-score outlier detection (3-sigma by default)
//! - An isolation forest density model, refit on every qualifying tick
//! - A per-signal detector OR-combining both methods

mod detector;
mod history;
mod isolation_forest;
mod zscore;

pub use detector::{AnomalyVerdict, SignalDetector};
pub use history::RollingHistory;
pub use isolation_forest::{DensityModel, IsolationForest};
pub use zscore::{ZScoreAnomaly, ZScoreDetector, DEFAULT_MIN_HISTORY, DEFAULT_Z_THRESHOLD};
