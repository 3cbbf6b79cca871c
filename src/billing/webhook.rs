//! Billing webhook verification and parsing.
//!
//! The signature header looks like `t=1700000000,v1=<hex>,v1=<hex>`. The
//! signed payload is `"{t}.{raw body}"`, HMAC-SHA256 with the shared secret.

use crate::billing::{SubscriptionEvent, SubscriptionStatus};
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, error};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

const SUBSCRIPTION_EVENT_TYPES: &[&str] = &[
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
];

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Missing signature header")]
    MissingSignature,
    #[error("Malformed signature header")]
    MalformedSignature,
    #[error("Signature timestamp outside tolerance")]
    StaleTimestamp,
    #[error("Signature mismatch")]
    SignatureMismatch,
    #[error("Invalid webhook secret")]
    InvalidSecret,
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_signature_header(header: &str) -> Result<SignatureHeader, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedSignature)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedSignature);
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

impl WebhookVerifier {
    /// A `whsec_` prefix on the secret is accepted and stripped.
    pub fn new(secret: &str, tolerance_secs: i64) -> Self {
        let secret = secret.strip_prefix("whsec_").unwrap_or(secret);
        Self {
            secret: secret.as_bytes().to_vec(),
            tolerance_secs,
        }
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| {
            error!("Invalid webhook secret key");
            WebhookError::InvalidSecret
        })?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Produces a header value for `payload`, as the billing provider would.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, WebhookError> {
        let mac = self.mac(timestamp, payload)?;
        Ok(format!("t={},v1={}", timestamp, hex::encode(mac)))
    }

    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let header = header.ok_or(WebhookError::MissingSignature)?;
        let parsed = parse_signature_header(header)?;

        // `t` is untrusted; abs_diff cannot overflow on extreme values.
        if now.timestamp().abs_diff(parsed.timestamp) > self.tolerance_secs.unsigned_abs() {
            error!(
                "Webhook timestamp {} outside tolerance of {}s",
                parsed.timestamp, self.tolerance_secs
            );
            return Err(WebhookError::StaleTimestamp);
        }

        let expected = self.mac(parsed.timestamp, payload)?;
        let matched = parsed
            .signatures
            .iter()
            .any(|candidate| bool::from(expected.as_slice().ct_eq(candidate.as_slice())));
        if !matched {
            error!("Webhook signature mismatch");
            return Err(WebhookError::SignatureMismatch);
        }

        debug!("Webhook signature verified");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
    current_period_end: Option<i64>,
}

/// Parses a verified body. `Ok(None)` means the event is not about a
/// subscription and needs no handling.
pub fn parse_event(payload: &[u8]) -> Result<Option<SubscriptionEvent>, WebhookError> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)?;
    if !SUBSCRIPTION_EVENT_TYPES.contains(&envelope.event_type.as_str()) {
        debug!(
            "Ignoring billing event {} of type {}",
            envelope.id, envelope.event_type
        );
        return Ok(None);
    }

    let object: SubscriptionObject = serde_json::from_value(envelope.data.object)?;
    let current_period_end = object
        .current_period_end
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    Ok(Some(SubscriptionEvent {
        event_id: envelope.id,
        event_type: envelope.event_type,
        subscription_id: object.id,
        status: SubscriptionStatus::parse(&object.status),
        cancel_at_period_end: object.cancel_at_period_end,
        current_period_end,
    }))
}
