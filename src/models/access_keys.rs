use crate::models::schema::{access_keys, websites};
use crate::models::websites::Website;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AccessKeyError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

#[derive(Queryable, Clone)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(table_name = access_keys)]
pub struct AccessKey {
    pub id: Uuid,
    pub website_id: Uuid,
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKey")
            .field("id", &self.id)
            .field("website_id", &self.website_id)
            .field("key_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Keys are only ever stored and compared as their SHA-256 hex digest.
pub fn hash_access_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl AccessKey {
    pub fn get_website_by_key_hash(
        conn: &mut PgConnection,
        key_hash: &str,
    ) -> Result<Option<Website>, AccessKeyError> {
        let found = access_keys::table
            .inner_join(websites::table)
            .filter(access_keys::key_hash.eq(key_hash))
            .first::<(AccessKey, Website)>(conn)
            .optional()
            .map_err(AccessKeyError::DatabaseError)?;

        Ok(found.map(|(key, website)| {
            debug!("Access key {} resolved to website {}", key.id, website.id);
            website
        }))
    }
}
