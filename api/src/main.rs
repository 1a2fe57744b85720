mod api_handlers;
mod auth;
mod config;
mod database;
mod request_logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::AppConfig;
use database::Database;
use poem::{
    get, listener::TcpListener, middleware::Cors, post, Endpoint, EndpointExt, Response, Route,
    Server,
};
use request_logging::RequestLogging;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "api-server")]
#[command(about = "Billing admin query API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve,
    /// Apply database migrations and exit
    Migrate,
}

pub fn build_app(
    database: Arc<Database>,
    config: Arc<AppConfig>,
) -> impl Endpoint<Output = Response> {
    Route::new()
        .at("/api/v1/health", get(api_handlers::health))
        // Filter-tree listings, tenant scoped
        .at(
            "/api/v1/resources/:resource/fields",
            get(api_handlers::list_resource_fields),
        )
        .at(
            "/api/v1/resources/:resource/filter",
            post(api_handlers::filter_resource),
        )
        // Admin ad-hoc querying
        .at(
            "/api/v1/admin/query-builder",
            post(api_handlers::run_query_builder),
        )
        .at(
            "/api/v1/admin/query-builder/tables",
            get(api_handlers::list_query_tables),
        )
        .at(
            "/api/v1/admin/custom-sql",
            post(api_handlers::run_custom_sql),
        )
        .data(database)
        .data(config)
        .with(Cors::new())
        .with(RequestLogging)
}

async fn open_database(config: &AppConfig) -> Result<Database> {
    match Database::new(&config.database_url, config.max_connections).await {
        Ok(db) => {
            tracing::info!("Database initialized at {}", config.database_url);
            Ok(db)
        }
        Err(e) => {
            tracing::error!(
                "Failed to initialize database at {}: {:#}",
                config.database_url,
                e
            );
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if it exists
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    match cli.command {
        Commands::Serve => serve_command(config).await,
        Commands::Migrate => migrate_command(config).await,
    }
}

async fn serve_command(config: AppConfig) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let database = Arc::new(open_database(&config).await?);

    tracing::info!(
        default_limit = config.query_limits.default_limit,
        max_limit = config.query_limits.max_limit,
        timeout_ms = config.execution.timeout.as_millis() as u64,
        "Starting billing query API on {}",
        addr
    );

    let app = build_app(database, Arc::new(config));
    Server::new(TcpListener::bind(&addr)).run(app).await?;
    Ok(())
}

async fn migrate_command(config: AppConfig) -> Result<()> {
    let database = open_database(&config).await?;
    database.close().await;
    tracing::info!("Migrations applied");
    Ok(())
}
