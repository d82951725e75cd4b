use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::path::PathBuf;

/// Process configuration, read from `config/homelog.toml` when present and
/// overridden by `HOMELOG_*` environment variables (e.g. `HOMELOG_API_KEY`).
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Shared secret checked against the `x-api-key` header.
    pub api_key: String,
    /// Listen address for `serve`.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory for the JSONL store. When unset, an in-memory store is
    /// used and nothing survives a restart.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// UTC offset used when rendering timestamps, e.g. "+02:00".
    #[serde(default)]
    pub display_offset: Option<String>,
    /// Endpoint POSTed to when a request fails with a server error.
    #[serde(default)]
    pub error_report_url: Option<String>,

    // SMTP credentials for the notify-cross job
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub mail_from: Option<String>,
    #[serde(default)]
    pub mail_to: Option<String>,
    #[serde(default)]
    pub mail_login: Option<String>,
    #[serde(default)]
    pub mail_password: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Settings {
    /// Display offset as a chrono FixedOffset, UTC when unset or malformed.
    pub fn display_offset(&self) -> FixedOffset {
        self.display_offset
            .as_deref()
            .and_then(|raw| raw.parse::<FixedOffset>().ok())
            .unwrap_or(Utc.fix())
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/homelog").required(false))
        .add_source(config::Environment::with_prefix("homelog"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
