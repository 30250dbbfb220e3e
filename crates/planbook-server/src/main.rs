//! Planbook Server — application entry point.

use planbook_db::{DbConfig, DbManager};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("planbook=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting Planbook server...");

    let config = DbConfig::from_env();
    let manager = match DbManager::connect(&config).await {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to SurrealDB");
            std::process::exit(1);
        }
    };

    if let Err(e) = planbook_db::run_migrations(manager.client()).await {
        tracing::error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }

    tracing::info!("Planbook storage ready.");

    // TODO: mount the HTTP controller layer once the REST surface lands.

    tracing::info!("Planbook server stopped.");
}
