//! Durable tick log
//!
//! Tick results can additionally be appended to a JSON-lines file. The
//! in-memory record cache stays authoritative for recent-record queries;
//! a failed append is logged by the caller and otherwise ignored.

use crate::models::TickResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Best-effort durable sink for tick results
#[async_trait]
pub trait PersistentLog: Send + Sync {
    async fn append(&self, record: &TickResult) -> Result<()>;

    /// The last `n` persisted records, oldest first
    async fn tail(&self, n: usize) -> Result<Vec<TickResult>>;
}

/// Appends one JSON object per line
pub struct JsonLinesLog {
    path: PathBuf,
    // Serializes writers so lines never interleave
    write_lock: Mutex<()>,
}

impl JsonLinesLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PersistentLog for JsonLinesLog {
    async fn append(&self, record: &TickResult) -> Result<()> {
        let mut line = serde_json::to_vec(record).context("Failed to serialize tick result")?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open tick log {:?}", self.path))?;

        file.write_all(&line)
            .await
            .context("Failed to write tick result")?;
        file.flush().await.context("Failed to flush tick log")?;

        debug!(path = %self.path.display(), "Tick result persisted");
        Ok(())
    }

    /// Malformed lines are skipped
    async fn tail(&self, n: usize) -> Result<Vec<TickResult>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {:?}", self.path));
            }
        };

        let records: Vec<TickResult> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        let skip = records.len().saturating_sub(n);
        Ok(records.into_iter().skip(skip).collect())
    }
}
