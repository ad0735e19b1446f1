//! Import wizard
//!
//! Multi-step workflow for statement import: upload a file, wait for
//! asynchronous extraction, review and correct the candidate rows,
//! then commit and watch the import job until it settles. The
//! orchestrator owns the step index and the job id; stages live in the
//! submodules.

mod commit;
mod preview;
mod upload;

pub use commit::CommitStage;
pub use preview::{PreviewCounts, PreviewState, RowEdit};
pub use upload::{FileKind, UploadStage};

use crate::api::{ImportApi, UploadRequest};
use crate::error::{AppError, Result};
use crate::models::{ImportJob, ImportJobStatus, RowCounts};
use crate::poller::JobWatcher;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Wizard step progression
///
/// Forward-only with no skipping; `Failed` is reachable from the three
/// middle steps. Going back after advancing is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Upload,
    ExtractReview,
    PreviewAndEdit,
    CommitAndPoll,
    Done,
    Failed,
}

impl WizardStep {
    fn rank(&self) -> u8 {
        match self {
            WizardStep::Upload => 0,
            WizardStep::ExtractReview => 1,
            WizardStep::PreviewAndEdit => 2,
            WizardStep::CommitAndPoll => 3,
            WizardStep::Done => 4,
            WizardStep::Failed => 5,
        }
    }

    /// Whether `next` is a legal transition from `self`
    pub fn can_advance_to(&self, next: WizardStep) -> bool {
        match (self, next) {
            (WizardStep::Done | WizardStep::Failed, _) => false,
            (
                WizardStep::ExtractReview | WizardStep::PreviewAndEdit | WizardStep::CommitAndPoll,
                WizardStep::Failed,
            ) => true,
            (WizardStep::Upload, WizardStep::Failed) => false,
            _ => next.rank() == self.rank() + 1,
        }
    }
}

/// Orchestrator for one upload-to-commit lifecycle
///
/// Each instance owns its own job id and row cache; nothing is shared
/// across concurrent wizards.
pub struct ImportWizard {
    api: Arc<dyn ImportApi>,
    watcher: Arc<JobWatcher>,
    step: RwLock<WizardStep>,
    job_id: RwLock<Option<i64>>,
    job: RwLock<Option<ImportJob>>,
    preview: RwLock<Option<PreviewState>>,
    commit: CommitStage,
    error: RwLock<Option<String>>,
    skip_duplicates_default: bool,
}

impl ImportWizard {
    pub fn new(
        api: Arc<dyn ImportApi>,
        watcher: Arc<JobWatcher>,
        skip_duplicates_default: bool,
    ) -> Self {
        Self {
            api,
            watcher,
            step: RwLock::new(WizardStep::Upload),
            job_id: RwLock::new(None),
            job: RwLock::new(None),
            preview: RwLock::new(None),
            commit: CommitStage::new(),
            error: RwLock::new(None),
            skip_duplicates_default,
        }
    }

    /// Re-enter an in-flight job (job id from the route), mapping the
    /// server-side status onto the step machine.
    pub async fn resume(
        api: Arc<dyn ImportApi>,
        watcher: Arc<JobWatcher>,
        skip_duplicates_default: bool,
        job_id: i64,
    ) -> Result<Self> {
        let job = api.get_job(job_id).await?;
        let step = match job.status {
            ImportJobStatus::Uploaded => WizardStep::ExtractReview,
            ImportJobStatus::Extracted | ImportJobStatus::Previewed => WizardStep::PreviewAndEdit,
            ImportJobStatus::Committing => WizardStep::CommitAndPoll,
            ImportJobStatus::Completed => WizardStep::Done,
            ImportJobStatus::Failed => WizardStep::Failed,
        };
        info!("Resuming job {} at {:?}", job_id, step);

        let wizard = Self::new(api, watcher, skip_duplicates_default);
        *wizard.step.write() = step;
        *wizard.job_id.write() = Some(job_id);
        *wizard.error.write() = job.error_message.clone();
        *wizard.job.write() = Some(job);
        Ok(wizard)
    }

    pub fn step(&self) -> WizardStep {
        *self.step.read()
    }

    pub fn job_id(&self) -> Option<i64> {
        *self.job_id.read()
    }

    /// Latest cached copy of the server-owned job
    pub fn job(&self) -> Option<ImportJob> {
        self.job.read().clone()
    }

    /// User-visible failure message, if the wizard has failed
    pub fn error(&self) -> Option<String> {
        self.error.read().clone()
    }

    /// Final counts for the terminal view
    pub fn summary(&self) -> Option<RowCounts> {
        self.job.read().as_ref().map(|job| job.counts)
    }

    /// Upload stage: validate and submit the file, then advance.
    ///
    /// Client-side validation failures and server errors surface to the
    /// caller without a state transition.
    pub async fn upload(&self, request: UploadRequest) -> Result<i64> {
        self.expect_step(WizardStep::Upload)?;

        let job_id = UploadStage::submit(self.api.as_ref(), request).await?;
        *self.job_id.write() = Some(job_id);
        self.advance_to(WizardStep::ExtractReview)?;
        Ok(job_id)
    }

    /// Extract-review stage: poll the job until extraction completes,
    /// then advance to preview. The poll is stopped once the milestone
    /// is reached; review needs no recurring fetch.
    pub async fn await_extraction(&self) -> Result<()> {
        self.expect_step(WizardStep::ExtractReview)?;
        let job_id = self.require_job_id()?;

        let mut rx = self.watcher.watch_job(job_id);
        let outcome = self
            .wait_for(&mut rx, job_id, |status| {
                status.has_reached(ImportJobStatus::Extracted)
            })
            .await;
        self.watcher.stop_job(job_id);

        match outcome? {
            ImportJobStatus::Failed => Err(self.fail_from_job(job_id)),
            _ => {
                self.advance_to(WizardStep::PreviewAndEdit)?;
                Ok(())
            }
        }
    }

    /// Load the preview rows for the current job
    pub async fn load_preview(&self) -> Result<()> {
        self.expect_step(WizardStep::PreviewAndEdit)?;
        let job_id = self.require_job_id()?;

        let state =
            PreviewState::load(self.api.as_ref(), job_id, self.skip_duplicates_default).await?;
        *self.preview.write() = Some(state);
        Ok(())
    }

    /// Read access to the loaded preview
    pub fn with_preview<R>(&self, f: impl FnOnce(&PreviewState) -> R) -> Result<R> {
        match self.preview.read().as_ref() {
            Some(state) => Ok(f(state)),
            None => Err(AppError::Internal("Preview not loaded".to_string())),
        }
    }

    /// Mutable access to the loaded preview (inline edits, toggle)
    pub fn with_preview_mut<R>(&self, f: impl FnOnce(&mut PreviewState) -> R) -> Result<R> {
        match self.preview.write().as_mut() {
            Some(state) => Ok(f(state)),
            None => Err(AppError::Internal("Preview not loaded".to_string())),
        }
    }

    /// Commit stage: submit the confirm request (single-submission
    /// guarded), advance, and poll until the import settles. Returns the
    /// final job on success.
    pub async fn confirm_and_poll(&self) -> Result<ImportJob> {
        self.expect_step(WizardStep::PreviewAndEdit)?;
        let job_id = self.require_job_id()?;
        let skip_duplicates = self.with_preview(|p| p.skip_duplicates())?;

        // A server rejection leaves the wizard in preview for a retry
        self.commit
            .confirm(self.api.as_ref(), job_id, skip_duplicates)
            .await?;
        self.advance_to(WizardStep::CommitAndPoll)?;

        let mut rx = self.watcher.watch_job(job_id);
        let outcome = self
            .wait_for(&mut rx, job_id, |status| status.is_terminal())
            .await;
        self.watcher.stop_job(job_id);

        match outcome? {
            ImportJobStatus::Completed => {
                self.advance_to(WizardStep::Done)?;
                self.job
                    .read()
                    .clone()
                    .ok_or_else(|| AppError::Internal("Completed job missing from cache".to_string()))
            }
            _ => Err(self.fail_from_job(job_id)),
        }
    }

    /// Stop any active poll for this wizard's job (navigation away)
    pub fn teardown(&self) {
        if let Some(job_id) = self.job_id() {
            self.watcher.stop_job(job_id);
        }
    }

    /// Watch snapshots until the cached job satisfies `done`, applying
    /// each arrival through the forward-only update rule.
    async fn wait_for(
        &self,
        rx: &mut watch::Receiver<Option<crate::poller::JobSnapshot>>,
        job_id: i64,
        done: impl Fn(&ImportJobStatus) -> bool,
    ) -> Result<ImportJobStatus> {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if let Some(snapshot) = snapshot {
                let status = {
                    let mut cached = self.job.write();
                    match cached.as_mut() {
                        Some(job) => {
                            job.apply_update(snapshot.job);
                            job.status
                        }
                        None => {
                            let status = snapshot.job.status;
                            *cached = Some(snapshot.job);
                            status
                        }
                    }
                };
                if status == ImportJobStatus::Failed || done(&status) {
                    return Ok(status);
                }
            }

            rx.changed().await.map_err(|_| {
                AppError::Internal(format!("Poller for job {} stopped unexpectedly", job_id))
            })?;
        }
    }

    fn require_job_id(&self) -> Result<i64> {
        self.job_id()
            .ok_or_else(|| AppError::Internal("Wizard has no job yet".to_string()))
    }

    fn fail_from_job(&self, job_id: i64) -> AppError {
        let message = self
            .job
            .read()
            .as_ref()
            .and_then(|job| job.error_message.clone())
            .unwrap_or_else(|| format!("Import job {} failed", job_id));
        warn!("Job {} failed: {}", job_id, message);
        *self.error.write() = Some(message.clone());
        let _ = self.advance_to(WizardStep::Failed);
        AppError::Business(message)
    }

    fn expect_step(&self, expected: WizardStep) -> Result<()> {
        let current = self.step();
        if current != expected {
            return Err(AppError::Internal(format!(
                "Wizard is at {:?}, expected {:?}",
                current, expected
            )));
        }
        Ok(())
    }

    fn advance_to(&self, next: WizardStep) -> Result<()> {
        let mut step = self.step.write();
        if !step.can_advance_to(next) {
            return Err(AppError::Internal(format!(
                "Invalid wizard transition {:?} -> {:?}",
                *step, next
            )));
        }
        info!("Wizard step {:?} -> {:?}", *step, next);
        *step = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeApi;
    use std::time::Duration;

    #[test]
    fn step_machine_is_forward_only_without_skips() {
        use WizardStep::*;
        assert!(Upload.can_advance_to(ExtractReview));
        assert!(ExtractReview.can_advance_to(PreviewAndEdit));
        assert!(PreviewAndEdit.can_advance_to(CommitAndPoll));
        assert!(CommitAndPoll.can_advance_to(Done));

        // No skipping, no going back
        assert!(!Upload.can_advance_to(PreviewAndEdit));
        assert!(!PreviewAndEdit.can_advance_to(Done));
        assert!(!CommitAndPoll.can_advance_to(PreviewAndEdit));

        // Failed only from the middle steps
        assert!(ExtractReview.can_advance_to(Failed));
        assert!(PreviewAndEdit.can_advance_to(Failed));
        assert!(CommitAndPoll.can_advance_to(Failed));
        assert!(!Upload.can_advance_to(Failed));

        // Terminal steps stay put
        assert!(!Done.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Upload));
    }

    #[tokio::test]
    async fn resume_maps_status_onto_steps() {
        let api = Arc::new(FakeApi::new());
        let watcher = Arc::new(JobWatcher::new(api.clone(), Duration::from_secs(5)));

        for (status, step) in [
            (ImportJobStatus::Uploaded, WizardStep::ExtractReview),
            (ImportJobStatus::Extracted, WizardStep::PreviewAndEdit),
            (ImportJobStatus::Committing, WizardStep::CommitAndPoll),
            (ImportJobStatus::Completed, WizardStep::Done),
            (ImportJobStatus::Failed, WizardStep::Failed),
        ] {
            api.script_job_statuses(42, vec![status]);
            let wizard = ImportWizard::resume(api.clone(), watcher.clone(), true, 42)
                .await
                .unwrap();
            assert_eq!(wizard.step(), step, "status {:?}", status);
            assert_eq!(wizard.job_id(), Some(42));
        }
    }

    #[test]
    fn job_id_is_required_before_polling() {
        let api = Arc::new(FakeApi::new());
        let watcher = Arc::new(JobWatcher::new(api.clone(), Duration::from_secs(5)));
        let wizard = ImportWizard::new(api, watcher, true);

        assert!(matches!(
            wizard.require_job_id(),
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn upload_is_rejected_outside_the_upload_step() {
        let api = Arc::new(FakeApi::new());
        let watcher = Arc::new(JobWatcher::new(api.clone(), Duration::from_secs(5)));
        api.script_job_statuses(42, vec![ImportJobStatus::Extracted]);

        let wizard = ImportWizard::resume(api.clone(), watcher, true, 42)
            .await
            .unwrap();
        let request = UploadRequest::new("a.csv", vec![1, 2, 3], 7);
        assert!(wizard.upload(request).await.is_err());
        assert_eq!(api.uploads(), 0);
    }
}
