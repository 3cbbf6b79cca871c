use crate::models::schema::websites;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum WebsiteError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Starter => "starter",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "free" => Some(Plan::Free),
            "starter" => Some(Plan::Starter),
            "pro" => Some(Plan::Pro),
            "enterprise" => Some(Plan::Enterprise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    None,
    Shopify,
    Wordpress,
    Custom,
}

impl PlatformType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" | "" => Some(PlatformType::None),
            "shopify" => Some(PlatformType::Shopify),
            "wordpress" => Some(PlatformType::Wordpress),
            "custom" => Some(PlatformType::Custom),
            _ => None,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = websites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Website {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub platform: String,
    pub plan: String,
    pub monthly_queries: i32,
    pub query_count: i32,
    pub active: bool,
    pub stripe_subscription_id: Option<String>,
    pub subscription_renews_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Website {
    /// Unknown plan strings are treated as the free tier.
    pub fn plan(&self) -> Plan {
        Plan::parse(&self.plan).unwrap_or(Plan::Free)
    }

    pub fn platform(&self) -> PlatformType {
        PlatformType::parse(&self.platform).unwrap_or(PlatformType::None)
    }

    pub fn get_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, WebsiteError> {
        websites::table
            .filter(websites::id.eq(id))
            .select(Website::as_select())
            .first(conn)
            .optional()
            .map_err(WebsiteError::DatabaseError)
    }

    pub fn get_by_subscription_id(
        conn: &mut PgConnection,
        subscription_id: &str,
    ) -> Result<Option<Self>, WebsiteError> {
        websites::table
            .filter(websites::stripe_subscription_id.eq(subscription_id))
            .select(Website::as_select())
            .first(conn)
            .optional()
            .map_err(WebsiteError::DatabaseError)
    }

    /// Drops every website linked to `subscription_id` back to the free tier
    /// and unlinks the subscription. Returns the number of rows touched.
    pub fn downgrade_by_subscription_id(
        conn: &mut PgConnection,
        subscription_id: &str,
        free_quota: i32,
    ) -> Result<usize, WebsiteError> {
        diesel::update(websites::table.filter(websites::stripe_subscription_id.eq(subscription_id)))
            .set((
                websites::plan.eq(Plan::Free.as_str()),
                websites::stripe_subscription_id.eq(None::<String>),
                websites::subscription_renews_at.eq(None::<DateTime<Utc>>),
                websites::monthly_queries.eq(free_quota),
            ))
            .execute(conn)
            .map_err(WebsiteError::DatabaseError)
    }

    pub fn set_renewal_by_subscription_id(
        conn: &mut PgConnection,
        subscription_id: &str,
        renews_at: DateTime<Utc>,
    ) -> Result<usize, WebsiteError> {
        diesel::update(websites::table.filter(websites::stripe_subscription_id.eq(subscription_id)))
            .set(websites::subscription_renews_at.eq(Some(renews_at)))
            .execute(conn)
            .map_err(WebsiteError::DatabaseError)
    }
}
