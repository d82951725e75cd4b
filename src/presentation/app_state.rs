// Application state for HTTP handlers
use std::sync::Arc;

use chrono::FixedOffset;

use crate::application::ingestion::IngestionService;
use crate::application::query::QueryService;
use crate::application::store::MeasurementStore;
use crate::infrastructure::config::Settings;

pub struct AppState {
    pub ingestion: IngestionService,
    pub query: QueryService,
    pub store: Arc<dyn MeasurementStore>,
    pub api_key: String,
    pub display_offset: FixedOffset,
    pub error_report_url: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn MeasurementStore>, settings: &Settings) -> Self {
        Self {
            ingestion: IngestionService::new(store.clone()),
            query: QueryService::new(store.clone()),
            store,
            api_key: settings.api_key.clone(),
            display_offset: settings.display_offset(),
            error_report_url: settings.error_report_url.clone(),
        }
    }
}
