use crate::billing::webhook::{parse_event, SIGNATURE_HEADER};
use crate::{ApiError, AppState};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

pub fn router(app_state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route("/v1/billing/webhook", post(billing_webhook))
        .with_state(app_state)
}

/// Once the signature checks out the provider always gets a 200, whatever
/// happened to the event. Failures are logged for follow-up instead.
async fn billing_webhook(
    State(data): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    debug!("Entering billing_webhook");
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = data.webhook_verifier.verify(&body, signature, Utc::now()) {
        warn!("Rejected billing webhook: {}", e);
        return Err(ApiError::Unauthorized);
    }

    match parse_event(&body) {
        Ok(Some(event)) => {
            data.subscriptions.handle(&event).await;
        }
        Ok(None) => {}
        Err(e) => error!("Verified billing webhook could not be parsed: {}", e),
    }

    Ok(Json(WebhookAck { received: true }))
}
