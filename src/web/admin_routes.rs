use crate::teardown::TeardownReport;
use crate::{ApiError, AppState};
use axum::{
    body::Body,
    extract::{rejection::PathRejection, Path, State},
    http::{header, Request},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::delete,
    Json, Router,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route(
            "/v1/admin/websites/:website_id",
            delete(teardown_website)
                .layer(from_fn_with_state(app_state.clone(), validate_admin_key)),
        )
        .with_state(app_state)
}

pub async fn validate_admin_key(
    State(data): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    let authorized: bool = presented
        .as_bytes()
        .ct_eq(data.admin_api_key.as_bytes())
        .into();
    if !authorized {
        warn!("Rejected admin request with invalid credentials");
        return ApiError::Unauthorized.into_response();
    }
    next.run(req).await
}

async fn teardown_website(
    State(data): State<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TeardownReport>, ApiError> {
    let Path(website_id) = path?;
    debug!("Entering teardown_website for {}", website_id);
    let report = data.teardown.teardown(website_id).await?;
    info!(
        "Website {} torn down, {} rows removed",
        website_id,
        report.rows_deleted()
    );
    Ok(Json(report))
}
