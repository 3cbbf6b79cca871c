use crate::db::DBConnection;
use crate::models::access_keys::hash_access_key;
use crate::models::websites::Website;
use crate::{ApiError, AppState};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolves a bearer credential to the website that owns it.
///
/// A missing header, an unknown key and a key whose website is gone all come
/// back as the same `Unauthorized`. The presented value is always hashed so
/// the work done does not depend on whether a header was sent.
pub fn resolve_access_key(
    db: &dyn DBConnection,
    credential: Option<&str>,
) -> Result<Website, ApiError> {
    let key_hash = hash_access_key(credential.unwrap_or_default());
    if credential.is_none() {
        tracing::debug!("Request without access key");
        return Err(ApiError::Unauthorized);
    }

    match db.get_website_by_access_key_hash(&key_hash) {
        Ok(Some(website)) => Ok(website),
        Ok(None) => {
            tracing::debug!("Access key not found in database");
            Err(ApiError::Unauthorized)
        }
        Err(e) => {
            tracing::error!("Database error during access key lookup: {:?}", e);
            Err(ApiError::from(e))
        }
    }
}

pub async fn validate_access_key(
    State(data): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let credential = bearer_token(req.headers());
    match resolve_access_key(data.db.as_ref(), credential) {
        Ok(website) => {
            req.extensions_mut().insert(website);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}
