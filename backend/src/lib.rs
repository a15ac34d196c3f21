//! Field Health Monitoring Platform - Backend
//!
//! Field boundary capture, vegetation index analysis and farm action
//! recommendations for smallholder farmers.

use std::{sync::Arc, time::Duration};

use axum::{routing::get, Router};
use shared::RecommendationEngine;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod storage;

pub use config::Config;

use config::{ProviderConfig, ProviderKind};
use error::{AppError, AppResult};
use external::{HttpIndexProvider, StaticIndexProvider, VegetationIndexProvider};
use services::{AnalysisPipeline, CaptureRegistry, FieldService};
use storage::FieldRepository;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub fields: FieldService,
    pub capture: Arc<CaptureRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire services from configuration over the given repository and provider
    pub fn new(
        config: Config,
        repository: Arc<dyn FieldRepository>,
        provider: Arc<dyn VegetationIndexProvider>,
    ) -> AppResult<Self> {
        let analyzer = config
            .analysis
            .analyzer()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        let pipeline = AnalysisPipeline::new(
            analyzer,
            RecommendationEngine::new(config.analysis.rules),
            provider,
            Duration::from_secs(config.provider.timeout_secs),
        );

        Ok(Self {
            fields: FieldService::new(repository, Arc::new(pipeline)),
            capture: Arc::new(CaptureRegistry::new(config.capture.min_displacement_meters)),
            config: Arc::new(config),
        })
    }
}

/// Index provider selected by configuration
pub fn index_provider(config: &ProviderConfig) -> AppResult<Arc<dyn VegetationIndexProvider>> {
    match config.kind {
        ProviderKind::Static => Ok(Arc::new(StaticIndexProvider::default())),
        ProviderKind::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                AppError::Configuration("provider.endpoint is required".to_string())
            })?;
            let provider = HttpIndexProvider::new(
                endpoint,
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(Arc::new(provider))
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Field Health Monitoring Platform API v1.0"
}
