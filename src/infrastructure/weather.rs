// Weather sync client - pulls a flat JSON object of numeric attributes
use anyhow::Context;
use serde_json::{Map, Value};

use crate::domain::measurement::RawValue;

/// Fetch weather attributes from `url`. The endpoint must return a flat
/// JSON object; entries that do not coerce to a number (city names, icons)
/// are dropped so the remaining batch passes ingestion validation.
pub async fn fetch_attributes(url: &str) -> anyhow::Result<Map<String, Value>> {
    let response = reqwest::Client::new()
        .get(url)
        .send()
        .await
        .context("requesting weather endpoint")?;

    if !response.status().is_success() {
        anyhow::bail!("weather endpoint returned {}", response.status());
    }

    let data: Value = response
        .json()
        .await
        .context("parsing weather response as JSON")?;
    let object = data
        .as_object()
        .context("weather response is not a JSON object")?;

    Ok(numeric_attributes(object))
}

fn numeric_attributes(object: &Map<String, Value>) -> Map<String, Value> {
    let mut attributes = Map::new();
    for (key, value) in object {
        let numeric = RawValue::from_json(value)
            .and_then(|v| v.as_float())
            .is_some();
        if numeric {
            attributes.insert(key.clone(), value.clone());
        } else {
            tracing::debug!("skipping non-numeric weather attribute {}", key);
        }
    }
    attributes
}
