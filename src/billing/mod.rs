//! Keeps a website's plan and quota in line with its billing subscription.
//!
//! Events arrive at least once and in any order. Each one is judged on its own
//! against the current website row; nothing about past events is stored. Both
//! mutations are plain assignments, so a redelivered event changes nothing.

pub mod webhook;

use crate::db::{DBConnection, DBError};
use crate::locks::TenantLocks;
use crate::models::websites::Website;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DEFAULT_FREE_TIER_QUERY_LIMIT: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    Unpaid,
    Trialing,
    PastDue,
    Incomplete,
    IncompleteExpired,
    Paused,
    Unrecognized(String),
}

impl SubscriptionStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => SubscriptionStatus::Active,
            "canceled" => SubscriptionStatus::Canceled,
            "unpaid" => SubscriptionStatus::Unpaid,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "paused" => SubscriptionStatus::Paused,
            other => SubscriptionStatus::Unrecognized(other.to_string()),
        }
    }
}

/// A verified subscription notification. Discarded after handling.
#[derive(Debug, Clone)]
pub struct SubscriptionEvent {
    pub event_id: String,
    pub event_type: String,
    pub subscription_id: String,
    pub status: SubscriptionStatus,
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionAction {
    Downgrade,
    Renew(DateTime<Utc>),
    NoChange(&'static str),
}

/// Maps an event to the mutation it calls for.
///
/// `current_renewal` is only consulted with the ordering guard on: a renewal
/// older than what the website already has is then skipped instead of
/// rolling the date back.
pub fn decide(
    event: &SubscriptionEvent,
    current_renewal: Option<DateTime<Utc>>,
    ordering_guard: bool,
) -> SubscriptionAction {
    if event.cancel_at_period_end {
        return SubscriptionAction::Downgrade;
    }
    match &event.status {
        SubscriptionStatus::Canceled | SubscriptionStatus::Unpaid => SubscriptionAction::Downgrade,
        SubscriptionStatus::Active => match event.current_period_end {
            None => SubscriptionAction::NoChange("active event without period end"),
            Some(period_end) => match current_renewal {
                Some(current) if ordering_guard && period_end < current => {
                    SubscriptionAction::NoChange("stale renewal")
                }
                _ => SubscriptionAction::Renew(period_end),
            },
        },
        SubscriptionStatus::Unrecognized(_) => SubscriptionAction::NoChange("unrecognized status"),
        _ => SubscriptionAction::NoChange("status reserved for future handling"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReconcileOutcome {
    Downgraded,
    Renewed { renews_at: DateTime<Utc> },
    Ignored { reason: &'static str },
    /// No website is linked to the subscription (any more).
    UnknownSubscription,
    /// The store could not be read or written; logged for follow-up.
    Failed,
}

#[derive(Clone)]
pub struct SubscriptionReconciler {
    db: Arc<dyn DBConnection>,
    locks: TenantLocks,
    free_quota: i32,
    ordering_guard: bool,
}

impl SubscriptionReconciler {
    pub fn new(
        db: Arc<dyn DBConnection>,
        locks: TenantLocks,
        free_quota: i32,
        ordering_guard: bool,
    ) -> Self {
        Self {
            db,
            locks,
            free_quota,
            ordering_guard,
        }
    }

    /// Never fails: store errors are logged and reported as `Failed` so the
    /// webhook can still be acknowledged.
    pub async fn handle(&self, event: &SubscriptionEvent) -> ReconcileOutcome {
        match self.apply(event).await {
            Ok(outcome) => {
                info!(
                    "Billing event {} {} ({:?}) for subscription {}: {:?}",
                    event.event_id,
                    event.event_type,
                    event.status,
                    event.subscription_id,
                    outcome
                );
                outcome
            }
            Err(e) => {
                error!(
                    "Failed to apply billing event {} for subscription {}: {:?}",
                    event.event_id, event.subscription_id, e
                );
                ReconcileOutcome::Failed
            }
        }
    }

    async fn apply(&self, event: &SubscriptionEvent) -> Result<ReconcileOutcome, DBError> {
        let Some(website) = self.find_website(&event.subscription_id)? else {
            return Ok(ReconcileOutcome::UnknownSubscription);
        };

        let _guard = self.locks.lock(website.id).await;
        // Re-read under the lock; a teardown or another event may have won the race.
        let Some(website) = self.find_website(&event.subscription_id)? else {
            return Ok(ReconcileOutcome::UnknownSubscription);
        };

        if let SubscriptionStatus::Unrecognized(status) = &event.status {
            warn!(
                "Unrecognized subscription status {:?} in event {}",
                status, event.event_id
            );
        }

        let touched = match decide(event, website.subscription_renews_at, self.ordering_guard) {
            SubscriptionAction::Downgrade => {
                let touched = self
                    .db
                    .downgrade_subscription(&event.subscription_id, self.free_quota)?;
                (touched, ReconcileOutcome::Downgraded)
            }
            SubscriptionAction::Renew(renews_at) => {
                let touched = self
                    .db
                    .set_subscription_renewal(&event.subscription_id, renews_at)?;
                (touched, ReconcileOutcome::Renewed { renews_at })
            }
            SubscriptionAction::NoChange(reason) => {
                return Ok(ReconcileOutcome::Ignored { reason });
            }
        };

        match touched {
            (0, _) => Ok(ReconcileOutcome::UnknownSubscription),
            (_, outcome) => Ok(outcome),
        }
    }

    fn find_website(&self, subscription_id: &str) -> Result<Option<Website>, DBError> {
        let website = self.db.get_website_by_subscription_id(subscription_id)?;
        if website.is_none() {
            debug!("No website linked to subscription {}", subscription_id);
        }
        Ok(website)
    }
}
