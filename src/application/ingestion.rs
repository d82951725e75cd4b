// Ingestion service - validate and persist measurement batches
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::application::store::MeasurementStore;
use crate::domain::measurement::{Measurement, RawValue, parse_timestamp};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No JSON data")]
    EmptyBody,
    #[error("NOT_FLOATABLE: cannot store {raw} as {tag} in {model}")]
    NotFloatable {
        model: String,
        tag: String,
        raw: String,
    },
    #[error("invalid created_at: {raw}")]
    BadTimestamp { raw: String },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Validates a flat tag->value submission and appends one record per tag,
/// all sharing a single batch timestamp. Validation runs over the whole
/// batch before the first insert, so a bad value leaves the store untouched.
#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn MeasurementStore>,
}

impl IngestionService {
    pub fn new(store: Arc<dyn MeasurementStore>) -> Self {
        Self { store }
    }

    /// Ingest one submission into `model`. Returns the number of records
    /// inserted. The optional `created_at` entry applies to every tag;
    /// when absent the current UTC time is taken once for the whole batch.
    pub async fn ingest(
        &self,
        model: &str,
        body: &Map<String, Value>,
    ) -> Result<usize, IngestError> {
        let created_at = match body.get("created_at") {
            None => Utc::now(),
            Some(raw) => {
                let text = raw.as_str().ok_or_else(|| IngestError::BadTimestamp {
                    raw: raw.to_string(),
                })?;
                parse_timestamp(text).ok_or_else(|| IngestError::BadTimestamp {
                    raw: text.to_string(),
                })?
            }
        };

        let mut batch = Vec::new();
        for (tag, raw) in body {
            if tag == "created_at" {
                continue;
            }
            let value = RawValue::from_json(raw)
                .and_then(|v| v.as_float())
                .ok_or_else(|| IngestError::NotFloatable {
                    model: model.to_string(),
                    tag: tag.clone(),
                    raw: raw.to_string(),
                })?;
            batch.push(Measurement::new(value, tag.clone(), created_at));
        }

        if batch.is_empty() {
            return Err(IngestError::EmptyBody);
        }

        let count = batch.len();
        for record in batch {
            self.store.insert(model, record).await?;
        }
        tracing::debug!("inserted {} records into {}", count, model);
        Ok(count)
    }
}
