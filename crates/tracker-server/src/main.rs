//! Tracker server: loads configuration, connects to SurrealDB, applies
//! migrations and holds the mutation service until shutdown.

mod config;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracker_api::Mutations;
use tracker_db::{DbManager, SurrealTransactionEngine};

use crate::config::{LogSettings, ServerConfig};

fn init_logging(settings: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    init_logging(&config.log);

    info!("Starting tracker server...");

    let auth = config.auth_config()?;
    let manager = DbManager::connect(&config.db).await?;
    let db = manager.client().clone();
    tracker_db::run_migrations(&db).await?;
    info!(schema_version = tracker_db::latest_version(), "Schema is up to date");

    let _mutations = Mutations::new(db.clone(), SurrealTransactionEngine::new(db), auth);
    info!("Mutation service ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Unable to listen for shutdown signal");
    }

    info!("Tracker server stopped.");
    Ok(())
}
