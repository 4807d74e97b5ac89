//! Error types for the monitoring core

use std::time::Duration;
use thiserror::Error;

/// Reasons a tick produced no result
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The metric source returned an error
    #[error("metric source unavailable: {0}")]
    SourceUnavailable(#[source] anyhow::Error),

    /// The metric source did not answer within the read timeout
    #[error("metric source timed out after {0:?}")]
    SourceTimeout(Duration),

    /// Anomaly evaluation failed for a signal
    #[error("anomaly detection failed for {signal}: {reason}")]
    Detection { signal: String, reason: String },

    /// Persisted history was requested but no log is configured
    #[error("no persistent tick log is configured")]
    PersistenceDisabled,

    /// The persistent log could not be read
    #[error("persistent tick log unavailable: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl MonitorError {
    /// Whether the tick failed before any history was mutated
    pub fn is_read_failure(&self) -> bool {
        matches!(
            self,
            MonitorError::SourceUnavailable(_) | MonitorError::SourceTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
