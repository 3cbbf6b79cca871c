use crate::billing::webhook::WebhookVerifier;
use crate::billing::SubscriptionReconciler;
use crate::config::{AppConfig, ConfigError};
use crate::db::{setup_db, DBConnection, DBError};
use crate::locks::TenantLocks;
use crate::teardown::{TeardownError, TeardownService};
use crate::vector_index::{DisabledIndex, PineconeIndex, VectorIndex, VectorIndexError};
use axum::extract::rejection::PathRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod billing;
mod config;
mod db;
mod locks;
mod models;
mod teardown;
mod vector_index;
mod web;

#[cfg(test)]
mod testing;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalServerError,

    #[error("Bad Request")]
    BadRequest,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Resource not found")]
    NotFound,

    #[error("Service temporarily unavailable, retry later")]
    ServiceUnavailable,

    #[error("Teardown failed during {0}, retry to resume")]
    TeardownFailed(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::TeardownFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (
            status,
            Json(ErrorResponse {
                status: status.as_u16(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<DBError> for ApiError {
    fn from(err: DBError) -> Self {
        error!("Database error: {:?}", err);
        match err {
            DBError::ConnectionError | DBError::PhaseTimeout { .. } => ApiError::ServiceUnavailable,
            _ => ApiError::InternalServerError,
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path parameters: {}", rejection.body_text());
        ApiError::BadRequest
    }
}

impl From<TeardownError> for ApiError {
    fn from(err: TeardownError) -> Self {
        match err {
            TeardownError::NotFound(_) => ApiError::NotFound,
            e if e.is_retryable() => {
                error!("Teardown failed in {}: {}", e.stage(), e);
                ApiError::TeardownFailed(e.stage())
            }
            e => {
                error!("Teardown failed: {}", e);
                ApiError::InternalServerError
            }
        }
    }
}

pub struct AppState {
    db: Arc<dyn DBConnection>,
    teardown: TeardownService,
    subscriptions: SubscriptionReconciler,
    webhook_verifier: WebhookVerifier,
    admin_api_key: String,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DBConnection>,
        index: Arc<dyn VectorIndex>,
        admin_api_key: String,
        webhook_verifier: WebhookVerifier,
        free_quota: i32,
        ordering_guard: bool,
    ) -> Self {
        // One registry for both, so teardown and billing updates of the same
        // website never interleave.
        let locks = TenantLocks::new();
        Self {
            teardown: TeardownService::new(db.clone(), index, locks.clone()),
            subscriptions: SubscriptionReconciler::new(
                db.clone(),
                locks,
                free_quota,
                ordering_guard,
            ),
            db,
            webhook_verifier,
            admin_api_key,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database setup failed: {0}")]
    Database(#[from] DBError),
    #[error("Vector index setup failed: {0}")]
    VectorIndex(#[from] VectorIndexError),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

fn build_vector_index(config: &AppConfig) -> Result<Arc<dyn VectorIndex>, VectorIndexError> {
    match &config.vector_index {
        Some(settings) => {
            let index = PineconeIndex::new(
                &settings.host,
                settings.api_key.clone(),
                settings.dimension,
            )?;
            Ok(Arc::new(index))
        }
        None => {
            warn!("VECTOR_INDEX_HOST not set, vector cleanup will fail for websites with an index");
            Ok(Arc::new(DisabledIndex))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!("Starting with {:?}", config);

    let db = setup_db(&config.database_url, config.database_pool_size)?;
    let index = build_vector_index(&config)?;
    let app_state = Arc::new(AppState::new(
        Arc::new(db),
        index,
        config.admin_api_key.clone(),
        WebhookVerifier::new(&config.webhook_secret, config.webhook_tolerance_secs),
        config.free_tier_query_limit,
        config.ordering_guard,
    ));

    let app = web::router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
