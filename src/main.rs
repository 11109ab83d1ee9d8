//! Part Catalog - customer/part/revision directory and archived file access.

mod archive;
mod catalog;
mod config;
mod error;
mod routes;
mod store;

use std::sync::Arc;

use archive::FileArchive;
use config::ServiceConfig;
use routes::AppState;
use store::MySqlCatalog;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "part_catalog=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    info!(
        "Catalog database {}@{}:{}/{}",
        config.database.user, config.database.host, config.database.port, config.database.database
    );

    let archive = FileArchive::new(config.archive_path.clone());
    if archive.path().exists() {
        info!("Serving files from {:?}", archive.path());
    } else {
        warn!("File archive {:?} not found; file routes will fail until it exists", archive.path());
    }

    // Build application state
    let state = AppState {
        catalog: Arc::new(MySqlCatalog::new(&config.database)),
        archive: Arc::new(archive),
    };

    let app = routes::router(state);

    // Run server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
