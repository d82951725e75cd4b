// Main entry point - Dependency injection, server setup and scheduled jobs
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::io::BufReader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::alerts::CrossAlertService;
use crate::application::csv_import::import_csv;
use crate::application::ingestion::IngestionService;
use crate::application::store::MeasurementStore;
use crate::infrastructure::config::{Settings, load_settings};
use crate::infrastructure::jsonl_store::JsonlStore;
use crate::infrastructure::mailer::SmtpNotifier;
use crate::infrastructure::memory_store::MemoryStore;
use crate::infrastructure::{report, weather};
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::router;

#[derive(Parser)]
#[command(name = "homelog", about = "Personal telemetry logger")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Notify when an inside temperature crosses above the outside one
    NotifyCross {
        #[arg(long, default_value = "temperature")]
        model: String,
        /// Inside tags to watch; repeatable
        #[arg(long = "inside", required = true)]
        inside: Vec<String>,
        #[arg(long, default_value = "patio")]
        outside: String,
    },
    /// Bulk-import a created_at,measurement,value CSV file
    ImportCsv { model: String, path: PathBuf },
    /// Fetch numeric weather attributes from a JSON endpoint and ingest them
    SyncWeather {
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "weather")]
        model: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = load_settings()?;
    let store = build_store(&settings)?;

    let result = run(cli.command, &settings, store).await;
    if let Err(e) = &result {
        report::report_error(settings.error_report_url.as_deref(), &format!("{e:#}")).await;
    }
    result
}

async fn run(
    command: Command,
    settings: &Settings,
    store: Arc<dyn MeasurementStore>,
) -> anyhow::Result<()> {
    match command {
        Command::Serve => serve(settings, store).await,
        Command::NotifyCross {
            model,
            inside,
            outside,
        } => {
            let notifier = Arc::new(SmtpNotifier::from_settings(settings)?);
            let alerts = CrossAlertService::new(store, notifier);
            let notified = alerts.check_cross(&model, &inside, &outside).await?;
            tracing::info!("notified tags: {:?}", notified);
            Ok(())
        }
        Command::ImportCsv { model, path } => {
            let file = std::fs::File::open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            let ingestion = IngestionService::new(store);
            let imported = import_csv(&ingestion, &model, BufReader::new(file)).await?;
            tracing::info!("imported {} rows into {}", imported, model);
            Ok(())
        }
        Command::SyncWeather { url, model } => {
            let attributes = weather::fetch_attributes(&url).await?;
            if attributes.is_empty() {
                anyhow::bail!("weather endpoint returned no numeric attributes");
            }
            let ingestion = IngestionService::new(store);
            let inserted = ingestion.ingest(&model, &attributes).await?;
            tracing::info!("synced {} weather attributes into {}", inserted, model);
            Ok(())
        }
    }
}

async fn serve(settings: &Settings, store: Arc<dyn MeasurementStore>) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(store, settings));
    let app = router(state);

    let addr: SocketAddr = settings
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {:?}", settings.bind))?;
    tracing::info!("starting homelog on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

/// The store handle is acquired once here and threaded through the services;
/// nothing else opens it.
fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn MeasurementStore>> {
    Ok(match &settings.data_dir {
        Some(dir) => Arc::new(JsonlStore::new(dir.clone())?),
        None => {
            tracing::warn!("no data_dir configured, measurements will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    })
}
