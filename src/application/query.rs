// Query service - single filter-resolution path for all renderers
use std::sync::Arc;

use crate::application::store::MeasurementStore;
use crate::domain::filter::{KNOWN_COLUMNS, parse_filters};
use crate::domain::measurement::Measurement;

/// Resolves a model name plus raw query-string pairs into ordered records.
/// Table, plot and CSV rendering all go through here, so one set of raw
/// arguments always yields one record set in one order.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn MeasurementStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn MeasurementStore>) -> Self {
        Self { store }
    }

    /// Parse filters from `raw_args` and fetch matching records, newest
    /// first. Control arguments (leading underscore, e.g. `_kind`) are not
    /// filters and are ignored here.
    pub async fn resolve(
        &self,
        model: &str,
        raw_args: &[(String, String)],
    ) -> anyhow::Result<Vec<Measurement>> {
        let filter_args: Vec<(String, String)> = raw_args
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .cloned()
            .collect();
        let filters = parse_filters(&filter_args, KNOWN_COLUMNS);
        self.store
            .find(model, &filters, "-created_at", None, None)
            .await
    }
}
