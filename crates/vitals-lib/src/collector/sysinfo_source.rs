//! Host metric source backed by sysinfo

use super::MetricSource;
use crate::models::SystemSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, Networks, RefreshKind, System};

struct Probes {
    sys: System,
    disks: Disks,
    networks: Networks,
}

impl Probes {
    fn sample(&mut self) -> SystemSnapshot {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        self.disks.refresh();
        if self.disks.list().is_empty() {
            self.disks.refresh_list();
        }
        self.networks.refresh();

        let cpu = self.sys.global_cpu_usage() as f64;

        let total_memory = self.sys.total_memory();
        let ram = if total_memory > 0 {
            self.sys.used_memory() as f64 / total_memory as f64 * 100.0
        } else {
            0.0
        };

        let (used, total) = self
            .disks
            .list()
            .iter()
            .fold((0u128, 0u128), |(used, total), disk| {
                let total_space = disk.total_space() as u128;
                let available = disk.available_space() as u128;
                (
                    used + total_space.saturating_sub(available),
                    total + total_space,
                )
            });
        let disk = if total > 0 {
            used as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let network_bytes = self
            .networks
            .list()
            .values()
            .map(|data| data.total_received().saturating_add(data.total_transmitted()))
            .fold(0u64, u64::saturating_add);

        SystemSnapshot {
            cpu: cpu.clamp(0.0, 100.0),
            ram: ram.clamp(0.0, 100.0),
            disk: disk.clamp(0.0, 100.0),
            network_bytes,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Reads CPU, memory, disk and network counters from the local host
///
/// Keeps one `sysinfo` instance alive so CPU usage is measured against the
/// previous refresh instead of blocking for a fresh baseline.
#[derive(Clone)]
pub struct SysinfoSource {
    probes: Arc<Mutex<Probes>>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        Self {
            probes: Arc::new(Mutex::new(Probes {
                sys,
                disks: Disks::new_with_refreshed_list(),
                networks: Networks::new_with_refreshed_list(),
            })),
        }
    }

    /// Host name reported by the OS
    pub fn host_name() -> String {
        System::host_name().unwrap_or_else(|| "unknown".to_string())
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSource for SysinfoSource {
    async fn read(&self) -> Result<SystemSnapshot> {
        let probes = Arc::clone(&self.probes);

        tokio::task::spawn_blocking(move || {
            let mut probes = probes
                .lock()
                .map_err(|_| anyhow::anyhow!("sysinfo probe lock poisoned"))?;
            Ok(probes.sample())
        })
        .await
        .context("sysinfo read task failed")?
    }
}
