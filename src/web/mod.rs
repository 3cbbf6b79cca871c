pub mod access_key_auth;
pub mod admin_routes;
pub mod billing_routes;
pub mod health_routes;
pub mod integration_routes;

use crate::AppState;
use axum::Router;
use std::sync::Arc;

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .merge(health_routes::router())
        .merge(admin_routes::router(app_state.clone()))
        .merge(billing_routes::router(app_state.clone()))
        .merge(integration_routes::router(app_state))
}
