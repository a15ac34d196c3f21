//! Field Health Monitoring Platform - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use field_health_backend::{
    config::Config,
    create_app, index_provider,
    storage::{FieldRepository, InMemoryFieldRepository, PgFieldRepository},
    AppState,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "fhm_server=debug,field_health_backend=debug,tower_http=debug,sqlx=warn".into()
    });
    if config.log.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Field Health Monitoring Server");
    tracing::info!("Environment: {}", config.environment);

    let repository: Arc<dyn FieldRepository> = match &config.database.url {
        Some(url) => {
            // Create database connection pool
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;

            tracing::info!("Database connection established");

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }

            Arc::new(PgFieldRepository::new(db_pool))
        }
        None => {
            tracing::warn!("No database URL configured, fields are kept in memory only");
            Arc::new(InMemoryFieldRepository::new())
        }
    };

    let provider = index_provider(&config.provider)?;
    tracing::info!("Vegetation index provider: {}", provider.name());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Create application state
    let state = AppState::new(config, repository, provider)?;
    state.capture.spawn_idle_sweeper(
        Duration::from_secs(state.config.capture.idle_timeout_secs),
        Duration::from_secs(60),
    );

    // Build application
    let app = create_app(state);

    // Start server
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
