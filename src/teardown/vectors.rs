//! Removes a website's vectors from the external index.
//!
//! Two layouts can coexist for one website: the legacy one, where vectors sit
//! in the default space tagged with a `websiteId` metadata field, and the
//! current one, where every vector lives in a namespace named after the
//! website id. Both are cleared before the local config row is retired, so a
//! missing config always means "nothing left in the index".

use crate::db::{DBConnection, DBError};
use crate::teardown::registry::Table;
use crate::vector_index::{MetadataFilter, VectorIndex, VectorIndexError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Metadata field carrying the website id on legacy vectors.
pub const LEGACY_WEBSITE_FIELD: &str = "websiteId";

/// Legacy vectors swept per call. Anything beyond this needs another call.
pub const LEGACY_PAGE_SIZE: u32 = 10_000;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Database error: {0}")]
    Database(#[from] DBError),
    #[error("Legacy vector sweep failed: {0}")]
    LegacySweep(#[source] VectorIndexError),
    #[error("Namespace delete failed: {0}")]
    NamespaceDelete(#[source] VectorIndexError),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct VectorCleanup {
    /// False when the website never had vectors materialized.
    pub had_config: bool,
    pub legacy_deleted: usize,
    pub namespace_cleared: bool,
}

pub async fn reconcile_vectors(
    db: &dyn DBConnection,
    index: &dyn VectorIndex,
    website_id: Uuid,
) -> Result<VectorCleanup, ReconcileError> {
    let Some(config) = db.get_vector_config(website_id)? else {
        debug!("No vector config for website {}, nothing to clean", website_id);
        return Ok(VectorCleanup::default());
    };

    let website_key = website_id.to_string();
    let filter = MetadataFilter {
        field: LEGACY_WEBSITE_FIELD,
        value: &website_key,
    };
    let legacy_ids = index
        .query_ids(None, filter, LEGACY_PAGE_SIZE)
        .await
        .map_err(ReconcileError::LegacySweep)?;
    if !legacy_ids.is_empty() {
        index
            .delete_ids(None, &legacy_ids)
            .await
            .map_err(ReconcileError::LegacySweep)?;
    }

    index
        .delete_all(&config.namespace())
        .await
        .map_err(ReconcileError::NamespaceDelete)?;

    let retired = db.delete_vector_config(website_id)?;
    debug!(
        "Removed {} {} row(s) for website {}",
        retired,
        Table::VectorConfigs.table_name(),
        website_id
    );

    info!(
        "Cleared vector index for website {} ({} legacy vectors)",
        website_id,
        legacy_ids.len()
    );
    Ok(VectorCleanup {
        had_config: true,
        legacy_deleted: legacy_ids.len(),
        namespace_cleared: true,
    })
}
