// File-backed store - one append-only JSON-lines file per series
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::application::store::{MeasurementStore, apply_query};
use crate::domain::filter::FilterSpec;
use crate::domain::measurement::Measurement;

/// Stores each series as `<dir>/<series>.jsonl`, one record per line. The
/// file is created on first insert and every insert is flushed to disk
/// before returning.
pub struct JsonlStore {
    dir: PathBuf,
    // serializes appends and keeps reads from seeing a half-written line
    lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating data directory {}", dir.display()))?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn series_path(&self, series: &str) -> anyhow::Result<PathBuf> {
        if series.is_empty()
            || !series
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            anyhow::bail!("invalid series name: {series:?}");
        }
        Ok(self.dir.join(format!("{series}.jsonl")))
    }

    async fn load(&self, path: &Path) -> anyhow::Result<Vec<Measurement>> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading series file {}", path.display()));
            }
        };
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .with_context(|| format!("corrupt record in {}", path.display()))
            })
            .collect()
    }
}

#[async_trait]
impl MeasurementStore for JsonlStore {
    async fn insert(&self, series: &str, record: Measurement) -> anyhow::Result<()> {
        let path = self.series_path(series)?;
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening series file {}", path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn find(
        &self,
        series: &str,
        filters: &FilterSpec,
        order_by: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> anyhow::Result<Vec<Measurement>> {
        let path = match self.series_path(series) {
            Ok(path) => path,
            // unknown/invalid series reads as empty, never errors
            Err(_) => return Ok(Vec::new()),
        };
        let _guard = self.lock.lock().await;
        let records = self.load(&path).await?;
        Ok(apply_query(records, filters, order_by, limit, offset))
    }

    async fn exists(&self, series: &str) -> anyhow::Result<bool> {
        let path = match self.series_path(series) {
            Ok(path) => path,
            Err(_) => return Ok(false),
        };
        Ok(fs::try_exists(&path).await?)
    }
}
