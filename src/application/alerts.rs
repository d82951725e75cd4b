// Cross-threshold alerting - notify when an inside temperature crosses
// above the outside one while the outside is falling
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::store::MeasurementStore;
use crate::domain::filter::{FilterSpec, FilterValue, MEMBERSHIP_OP};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()>;
}

pub struct CrossAlertService {
    store: Arc<dyn MeasurementStore>,
    notifier: Arc<dyn Notifier>,
}

impl CrossAlertService {
    pub fn new(store: Arc<dyn MeasurementStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Compare the two most recent readings of each inside tag against the
    /// outside tag. When the outside value is not rising and an inside value
    /// just crossed above it, send one notification for that tag. Returns
    /// the tags notified. Tags with fewer than two readings are skipped.
    pub async fn check_cross(
        &self,
        model: &str,
        inside_tags: &[String],
        outside_tag: &str,
    ) -> anyhow::Result<Vec<String>> {
        let (last_out, before_out) = match self.last_two(model, outside_tag).await? {
            Some(pair) => pair,
            None => return Ok(Vec::new()),
        };

        // going up?
        if before_out < last_out {
            return Ok(Vec::new());
        }

        let mut notified = Vec::new();
        for tag in inside_tags {
            let (last_in, before_in) = match self.last_two(model, tag).await? {
                Some(pair) => pair,
                None => continue,
            };

            // crosses and first cross
            if last_in >= last_out && before_in < before_out {
                self.notifier
                    .send(
                        &format!("{tag} temperature crossed above {outside_tag}"),
                        &format!("{last_in} vs {last_out}"),
                    )
                    .await?;
                notified.push(tag.clone());
            }
        }
        Ok(notified)
    }

    async fn last_two(&self, model: &str, tag: &str) -> anyhow::Result<Option<(f64, f64)>> {
        let filters = tag_filter(tag);
        let last = self
            .store
            .find_one(model, &filters, "-created_at", 0)
            .await?;
        let before = self
            .store
            .find_one(model, &filters, "-created_at", 1)
            .await?;
        Ok(match (last, before) {
            (Some(last), Some(before)) => Some((last.value, before.value)),
            _ => None,
        })
    }
}

fn tag_filter(tag: &str) -> FilterSpec {
    let mut filters = FilterSpec::new();
    filters.entry("measurement".to_string()).or_default().insert(
        MEMBERSHIP_OP.to_string(),
        FilterValue::Many(vec![tag.to_string()]),
    );
    filters
}
