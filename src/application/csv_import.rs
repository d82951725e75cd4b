// CSV bulk import - goes through IngestionService so every row is validated
use std::io::BufRead;

use anyhow::{Context, bail};
use serde_json::{Map, Value, json};

use crate::application::ingestion::IngestionService;

const HEADER: &str = "created_at,measurement,value";

/// Import `created_at,measurement,value` rows into `model`. A leading header
/// line is skipped. Any malformed row aborts the import, reporting its line
/// number; rows already imported stay (the job is restartable, not atomic).
pub async fn import_csv<R: BufRead>(
    ingestion: &IngestionService,
    model: &str,
    reader: R,
) -> anyhow::Result<usize> {
    let mut imported = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", index + 1))?;
        let line = line.trim();
        if line.is_empty() || (index == 0 && line == HEADER) {
            continue;
        }

        let mut fields = line.splitn(3, ',');
        let (created_at, tag, value) = match (fields.next(), fields.next(), fields.next()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => bail!("line {}: expected {}", index + 1, HEADER),
        };

        let row: Map<String, Value> = json!({
            tag: value,
            "created_at": created_at,
        })
        .as_object()
        .cloned()
        .unwrap_or_default();

        ingestion
            .ingest(model, &row)
            .await
            .with_context(|| format!("line {}", index + 1))?;
        imported += 1;
    }
    Ok(imported)
}
