//! Website teardown.
//!
//! Walks [`registry::TEARDOWN_PLAN`] stage by stage. Each delete phase is its
//! own transaction; a failure stops the walk and leaves earlier phases
//! committed. Every step deletes by website id, so calling [`TeardownService::teardown`]
//! again resumes from wherever the previous attempt stopped.

pub mod registry;
pub mod vectors;

use crate::db::{DBConnection, DBError, PhaseReport};
use crate::locks::TenantLocks;
use crate::vector_index::VectorIndex;
use registry::{Phase, Stage, TEARDOWN_PLAN};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;
use vectors::{reconcile_vectors, ReconcileError, VectorCleanup};

#[derive(Error, Debug)]
pub enum TeardownError {
    #[error("Website {0} not found")]
    NotFound(Uuid),
    #[error("Website lookup failed: {0}")]
    Lookup(#[source] DBError),
    #[error("Teardown phase `{phase}` failed: {source}")]
    Phase {
        phase: &'static str,
        #[source]
        source: DBError,
    },
    #[error("Vector index cleanup failed: {0}")]
    VectorIndex(#[from] ReconcileError),
}

impl TeardownError {
    /// Everything except a missing website can be retried from scratch.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TeardownError::NotFound(_))
    }

    /// Name of the stage that failed, for operators.
    pub fn stage(&self) -> &'static str {
        match self {
            TeardownError::NotFound(_) | TeardownError::Lookup(_) => "lookup",
            TeardownError::Phase { phase, .. } => *phase,
            TeardownError::VectorIndex(_) => "vector_index",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeardownReport {
    pub website_id: Uuid,
    pub phases: Vec<PhaseReport>,
    pub vectors: VectorCleanup,
}

impl TeardownReport {
    pub fn rows_deleted(&self) -> usize {
        self.phases.iter().map(PhaseReport::total_deleted).sum()
    }
}

#[derive(Clone)]
pub struct TeardownService {
    db: Arc<dyn DBConnection>,
    index: Arc<dyn VectorIndex>,
    locks: TenantLocks,
}

impl TeardownService {
    pub fn new(db: Arc<dyn DBConnection>, index: Arc<dyn VectorIndex>, locks: TenantLocks) -> Self {
        Self { db, index, locks }
    }

    pub async fn teardown(&self, website_id: Uuid) -> Result<TeardownReport, TeardownError> {
        let _guard = self.locks.lock(website_id).await;

        match self.db.get_website_by_id(website_id) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(TeardownError::NotFound(website_id)),
            Err(e) => {
                error!("Failed to look up website {} for teardown: {:?}", website_id, e);
                return Err(TeardownError::Lookup(e));
            }
        }

        info!("Starting teardown of website {}", website_id);
        let mut report = TeardownReport {
            website_id,
            phases: Vec::new(),
            vectors: VectorCleanup::default(),
        };

        for stage in TEARDOWN_PLAN {
            match stage {
                Stage::Delete(phase) => {
                    let phase_report = self.run_phase(website_id, *phase).await.map_err(|e| {
                        error!(
                            "Teardown of website {} failed in phase {}: {:?}",
                            website_id, phase.name, e
                        );
                        TeardownError::Phase {
                            phase: phase.name,
                            source: e,
                        }
                    })?;
                    info!(
                        "Phase {} removed {} rows for website {}",
                        phase.name,
                        phase_report.total_deleted(),
                        website_id
                    );
                    report.phases.push(phase_report);
                }
                Stage::VectorIndex => {
                    let cleanup =
                        reconcile_vectors(self.db.as_ref(), self.index.as_ref(), website_id).await;
                    report.vectors = cleanup.map_err(|e| {
                        error!(
                            "Vector cleanup failed during teardown of website {}: {:?}",
                            website_id, e
                        );
                        TeardownError::VectorIndex(e)
                    })?;
                }
            }
        }

        info!(
            "Teardown of website {} complete ({} rows)",
            website_id,
            report.rows_deleted()
        );
        Ok(report)
    }

    async fn run_phase(
        &self,
        website_id: Uuid,
        phase: &'static Phase,
    ) -> Result<PhaseReport, DBError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.run_teardown_phase(website_id, phase))
            .await
            .map_err(|e| DBError::TaskFailed(e.to_string()))?
    }
}
