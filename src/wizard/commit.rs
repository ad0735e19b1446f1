//! Confirm/commit stage
//!
//! Submits the whole-job commit request exactly once. The backend
//! exposes no idempotency key for this endpoint, so the only
//! double-submit protection is the client-side in-flight guard plus a
//! committed-once latch; whether a second request would be safe
//! server-side is unconfirmed and must not be assumed.

use crate::api::ImportApi;
use crate::error::{AppError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Commit stage of the import wizard
pub struct CommitStage {
    in_flight: AtomicBool,
    committed: AtomicBool,
}

impl CommitStage {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            committed: AtomicBool::new(false),
        }
    }

    /// Send the commit request for a job.
    ///
    /// While a request is pending, or once one has been accepted, any
    /// further call is rejected without touching the network.
    pub async fn confirm(
        &self,
        api: &dyn ImportApi,
        job_id: i64,
        skip_duplicates: bool,
    ) -> Result<()> {
        if self.committed.load(Ordering::SeqCst) {
            return Err(AppError::Validation(format!(
                "Job {} has already been committed",
                job_id
            )));
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            warn!("Commit for job {} already in flight, ignoring", job_id);
            return Err(AppError::Validation(
                "A commit request is already in progress".to_string(),
            ));
        }

        info!(
            "Committing job {} (skip duplicates: {})",
            job_id, skip_duplicates
        );
        let result = api.confirm(job_id, skip_duplicates).await;
        if result.is_ok() {
            self.committed.store(true, Ordering::SeqCst);
        }
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Whether a commit request is currently pending
    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Whether the commit has been accepted by the backend
    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::SeqCst)
    }
}

impl Default for CommitStage {
    fn default() -> Self {
        Self::new()
    }
}
