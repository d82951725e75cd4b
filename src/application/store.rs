// Store trait for series data access
use async_trait::async_trait;

use crate::domain::filter::{self, FilterSpec};
use crate::domain::measurement::Measurement;

/// Sort column with the leading-minus descending convention
/// (`-created_at` sorts newest first).
#[derive(Debug, Clone, Copy)]
pub struct OrderBy<'a> {
    pub column: &'a str,
    pub descending: bool,
}

impl<'a> OrderBy<'a> {
    pub fn parse(spec: &'a str) -> Self {
        match spec.strip_prefix('-') {
            Some(column) => Self {
                column,
                descending: true,
            },
            None => Self {
                column: spec,
                descending: false,
            },
        }
    }
}

/// Append-only per-series table. A series is created implicitly on first
/// insert; reading an unknown series returns an empty result, never an error.
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Durably append one record to a series before returning.
    async fn insert(&self, series: &str, record: Measurement) -> anyhow::Result<()>;

    /// Matching records, stably sorted by `order_by`, then offset/limit.
    async fn find(
        &self,
        series: &str,
        filters: &FilterSpec,
        order_by: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> anyhow::Result<Vec<Measurement>>;

    /// `find` with limit 1 at the given offset.
    async fn find_one(
        &self,
        series: &str,
        filters: &FilterSpec,
        order_by: &str,
        offset: usize,
    ) -> anyhow::Result<Option<Measurement>> {
        let records = self
            .find(series, filters, order_by, Some(1), Some(offset))
            .await?;
        Ok(records.into_iter().next())
    }

    /// Whether the series has been created (seen at least one insert).
    async fn exists(&self, series: &str) -> anyhow::Result<bool>;
}

/// Shared predicate/sort/slice path for store implementations.
pub(crate) fn apply_query(
    mut records: Vec<Measurement>,
    filters: &FilterSpec,
    order_by: &str,
    limit: Option<usize>,
    offset: Option<usize>,
) -> Vec<Measurement> {
    records.retain(|r| filter::matches(r, filters));

    let order = OrderBy::parse(order_by);
    match order.column {
        "created_at" => records.sort_by_key(|r| r.created_at),
        "value" => records.sort_by(|a, b| a.value.total_cmp(&b.value)),
        "measurement" => records.sort_by(|a, b| a.measurement.cmp(&b.measurement)),
        _ => {}
    }
    if order.descending {
        records.reverse();
    }

    let offset = offset.unwrap_or(0);
    let limit = limit.unwrap_or(usize::MAX);
    records.into_iter().skip(offset).take(limit).collect()
}
