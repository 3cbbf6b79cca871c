use crate::models::access_keys::{AccessKey, AccessKeyError};
use crate::models::content;
use crate::models::vector_configs::{VectorConfigError, VectorIndexConfig};
use crate::models::websites::{Website, WebsiteError};
use crate::teardown::registry::{Phase, Table};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DBError {
    #[error("Database connection error")]
    ConnectionError,
    #[error("Database query error: {0}")]
    QueryError(#[from] diesel::result::Error),
    #[error("Website error: {0}")]
    WebsiteError(#[from] WebsiteError),
    #[error("Access key error: {0}")]
    AccessKeyError(#[from] AccessKeyError),
    #[error("Vector config error: {0}")]
    VectorConfigError(#[from] VectorConfigError),
    #[error("Phase `{phase}` exceeded its {timeout:?} budget")]
    PhaseTimeout {
        phase: &'static str,
        timeout: Duration,
    },
    #[error("Blocking task failed: {0}")]
    TaskFailed(String),
}

impl DBError {
    fn is_statement_timeout(err: &diesel::result::Error) -> bool {
        matches!(
            err,
            diesel::result::Error::DatabaseError(_, info)
                if info.message().contains("statement timeout")
        )
    }
}

/// Rows removed by one step of a teardown phase.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepReport {
    pub table: &'static str,
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: &'static str,
    pub steps: Vec<StepReport>,
}

impl PhaseReport {
    pub fn new(phase: &'static str) -> Self {
        Self {
            phase,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, table: Table, deleted: usize) {
        self.steps.push(StepReport {
            table: table.table_name(),
            deleted,
        });
    }

    pub fn total_deleted(&self) -> usize {
        self.steps.iter().map(|s| s.deleted).sum()
    }
}

/// Relational store used by the tenant lifecycle and billing code.
///
/// Implementations are synchronous; async callers that may block for long
/// (teardown phases) run them on the blocking pool.
pub trait DBConnection: Send + Sync {
    fn get_website_by_id(&self, id: Uuid) -> Result<Option<Website>, DBError>;
    fn get_website_by_access_key_hash(&self, key_hash: &str) -> Result<Option<Website>, DBError>;
    fn get_website_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Website>, DBError>;

    /// Free plan, free quota, no subscription link, no renewal date.
    fn downgrade_subscription(&self, subscription_id: &str, free_quota: i32)
        -> Result<usize, DBError>;
    fn set_subscription_renewal(
        &self,
        subscription_id: &str,
        renews_at: DateTime<Utc>,
    ) -> Result<usize, DBError>;

    fn get_vector_config(&self, website_id: Uuid) -> Result<Option<VectorIndexConfig>, DBError>;
    fn delete_vector_config(&self, website_id: Uuid) -> Result<usize, DBError>;

    /// Runs every step of `phase` for `website_id` in a single transaction,
    /// bounded by the phase budget. Nothing is committed on failure.
    fn run_teardown_phase(&self, website_id: Uuid, phase: &Phase) -> Result<PhaseReport, DBError>;
}

#[derive(Clone)]
pub struct PostgresConnection {
    db: Pool<ConnectionManager<PgConnection>>,
}

impl PostgresConnection {
    pub fn new(db: Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, DBError> {
        self.db.get().map_err(|e| {
            error!("Failed to get connection from pool: {:?}", e);
            DBError::ConnectionError
        })
    }
}

pub fn setup_db(url: &str, max_size: u32) -> Result<PostgresConnection, DBError> {
    let manager = ConnectionManager::<PgConnection>::new(url);
    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| {
            error!("Could not build connection pool: {:?}", e);
            DBError::ConnectionError
        })?;
    Ok(PostgresConnection::new(pool))
}

impl DBConnection for PostgresConnection {
    fn get_website_by_id(&self, id: Uuid) -> Result<Option<Website>, DBError> {
        debug!("Getting website by id");
        let conn = &mut self.conn()?;
        Website::get_by_id(conn, id).map_err(DBError::from)
    }

    fn get_website_by_access_key_hash(&self, key_hash: &str) -> Result<Option<Website>, DBError> {
        let conn = &mut self.conn()?;
        AccessKey::get_website_by_key_hash(conn, key_hash).map_err(DBError::from)
    }

    fn get_website_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Website>, DBError> {
        debug!("Getting website by subscription id");
        let conn = &mut self.conn()?;
        Website::get_by_subscription_id(conn, subscription_id).map_err(DBError::from)
    }

    fn downgrade_subscription(
        &self,
        subscription_id: &str,
        free_quota: i32,
    ) -> Result<usize, DBError> {
        let conn = &mut self.conn()?;
        Website::downgrade_by_subscription_id(conn, subscription_id, free_quota)
            .map_err(DBError::from)
    }

    fn set_subscription_renewal(
        &self,
        subscription_id: &str,
        renews_at: DateTime<Utc>,
    ) -> Result<usize, DBError> {
        let conn = &mut self.conn()?;
        Website::set_renewal_by_subscription_id(conn, subscription_id, renews_at)
            .map_err(DBError::from)
    }

    fn get_vector_config(&self, website_id: Uuid) -> Result<Option<VectorIndexConfig>, DBError> {
        let conn = &mut self.conn()?;
        VectorIndexConfig::get_for_website(conn, website_id).map_err(DBError::from)
    }

    fn delete_vector_config(&self, website_id: Uuid) -> Result<usize, DBError> {
        let conn = &mut self.conn()?;
        VectorIndexConfig::delete_for_website(conn, website_id).map_err(DBError::from)
    }

    fn run_teardown_phase(&self, website_id: Uuid, phase: &Phase) -> Result<PhaseReport, DBError> {
        let conn = &mut self.conn()?;
        let started = Instant::now();
        let timed_out = || DBError::PhaseTimeout {
            phase: phase.name,
            timeout: phase.timeout,
        };

        conn.transaction::<_, DBError, _>(|tx| {
            let mut report = PhaseReport::new(phase.name);
            for table in phase.steps {
                let remaining = phase
                    .timeout
                    .checked_sub(started.elapsed())
                    .filter(|r| !r.is_zero())
                    .ok_or_else(timed_out)?;

                // SET cannot take bind parameters; the value is an integer we computed.
                diesel::sql_query(format!(
                    "SET LOCAL statement_timeout = {}",
                    remaining.as_millis().max(1)
                ))
                .execute(tx)?;

                let deleted =
                    content::delete_for_website(tx, *table, website_id).map_err(|e| {
                        if DBError::is_statement_timeout(&e) {
                            timed_out()
                        } else {
                            DBError::QueryError(e)
                        }
                    })?;
                debug!("Deleted {} rows from {}", deleted, table.table_name());
                report.record(*table, deleted);
            }
            Ok(report)
        })
    }
}
