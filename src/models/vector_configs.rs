use crate::models::schema::vector_db_configs;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum VectorConfigError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// Present while a website has vectors materialized in the index. Its
/// namespace there is the website id.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = vector_db_configs)]
pub struct VectorIndexConfig {
    pub id: Uuid,
    pub website_id: Uuid,
    pub index_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VectorIndexConfig {
    pub fn namespace(&self) -> String {
        self.website_id.to_string()
    }

    pub fn get_for_website(
        conn: &mut PgConnection,
        website_id: Uuid,
    ) -> Result<Option<Self>, VectorConfigError> {
        vector_db_configs::table
            .filter(vector_db_configs::website_id.eq(website_id))
            .first::<Self>(conn)
            .optional()
            .map_err(VectorConfigError::DatabaseError)
    }

    pub fn delete_for_website(
        conn: &mut PgConnection,
        website_id: Uuid,
    ) -> Result<usize, VectorConfigError> {
        diesel::delete(
            vector_db_configs::table.filter(vector_db_configs::website_id.eq(website_id)),
        )
        .execute(conn)
        .map_err(VectorConfigError::DatabaseError)
    }
}
