//! Creamery
//!
//! HTTP server for the ice cream batch journal.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use creamery::build_info;
use creamery::config::AppConfig;
use creamery::db::{self, Database};
use creamery::http::{create_router, AppState};
use creamery::suggest::AnthropicGenerator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("creamery=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    // Print startup banner to stderr
    build_info::print_startup_banner();

    let config = AppConfig::from_env();
    let db_path = config.database_path.clone();
    eprintln!("Database path: {}", db_path.display());

    // Ensure data directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    eprintln!("Initializing database...");
    let database = Database::new(&db_path)?;

    // Run migrations
    database.with_conn(|conn| {
        db::migrations::run_migrations(conn)?;
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(())
    })?;

    if config.generator.api_key.is_none() {
        eprintln!("ANTHROPIC_API_KEY is not set; suggestions will fail until it is");
    }
    let generator = AnthropicGenerator::new(config.generator.clone())?;

    let server_addr = config.server_addr.clone();
    let state = AppState::new(config, database, Arc::new(generator), db_path);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&server_addr).await?;
    info!("Listening on http://{}", server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
