use crate::models::websites::{Plan, PlatformType, Website};
use crate::web::access_key_auth::validate_access_key;
use crate::{ApiError, AppState};
use axum::{
    extract::{rejection::PathRejection, Path},
    middleware::from_fn_with_state,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// What an integration may see about its own website.
#[derive(Debug, Clone, Serialize)]
pub struct WebsiteStatus {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub platform: PlatformType,
    pub plan: Plan,
    pub monthly_queries: i32,
    pub query_count: i32,
    pub active: bool,
    pub subscription_renews_at: Option<DateTime<Utc>>,
}

impl From<&Website> for WebsiteStatus {
    fn from(website: &Website) -> Self {
        Self {
            id: website.id,
            name: website.name.clone(),
            url: website.url.clone(),
            platform: website.platform(),
            plan: website.plan(),
            monthly_queries: website.monthly_queries,
            query_count: website.query_count,
            active: website.active,
            subscription_renews_at: website.subscription_renews_at,
        }
    }
}

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route("/v1/integration/website", get(current_website))
        .route("/v1/integration/websites/:website_id", get(website_by_id))
        .layer(from_fn_with_state(app_state.clone(), validate_access_key))
        .with_state(app_state)
}

async fn current_website(Extension(website): Extension<Website>) -> Json<WebsiteStatus> {
    debug!("Integration status request for website {}", website.id);
    Json(WebsiteStatus::from(&website))
}

/// A key only ever opens its own website; asking for any other id looks
/// exactly like presenting a bad key.
async fn website_by_id(
    Extension(website): Extension<Website>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<WebsiteStatus>, ApiError> {
    let Path(website_id) = path?;
    if website.id != website_id {
        debug!("Access key for {} used against {}", website.id, website_id);
        return Err(ApiError::Unauthorized);
    }
    Ok(Json(WebsiteStatus::from(&website)))
}
