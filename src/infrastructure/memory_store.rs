// In-memory store - zero-config fallback and test double
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::store::{MeasurementStore, apply_query};
use crate::domain::filter::FilterSpec;
use crate::domain::measurement::Measurement;

#[derive(Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<String, Vec<Measurement>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MeasurementStore for MemoryStore {
    async fn insert(&self, series: &str, record: Measurement) -> anyhow::Result<()> {
        self.series
            .write()
            .await
            .entry(series.to_string())
            .or_default()
            .push(record);
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
        let records = self
            .series
            .read()
            .await
            .get(series)
            .cloned()
            .unwrap_or_default();
        Ok(apply_query(records, filters, order_by, limit, offset))
    }

    async fn exists(&self, series: &str) -> anyhow::Result<bool> {
        Ok(self.series.read().await.contains_key(series))
    }
}
