//! Metric sources and the background sampler
//!
//! A [`MetricSource`] produces one [`SystemSnapshot`] per read. The
//! [`SamplerLoop`] drives a monitor's tick on a fixed interval until its
//! handle is stopped.

mod r#loop;
mod sysinfo_source;

pub use r#loop::{SamplerHandle, SamplerLoop, SamplerLoopBuilder};
pub use sysinfo_source::SysinfoSource;

use crate::models::SystemSnapshot;
use anyhow::Result;

pub use async_trait::async_trait;

/// Source of host readings
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Take one snapshot of the host
    async fn read(&self) -> Result<SystemSnapshot>;
}
