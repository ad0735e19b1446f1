//! In-memory scripted backend for unit tests

use crate::api::{ImportApi, UploadReceipt, UploadRequest};
use crate::error::{AppError, Result};
use crate::models::{
    BackgroundJobExecution, CandidateRow, Category, ExecutionStatus, ImportJob, ImportJobStatus,
    JobStep, RowCounts, RowStatus, StepStatus, TxnKind,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Scripted `ImportApi` double that counts every call
pub struct FakeApi {
    job_statuses: Mutex<HashMap<i64, VecDeque<ImportJobStatus>>>,
    job_counts: Mutex<HashMap<i64, RowCounts>>,
    rows: Mutex<HashMap<i64, Vec<CandidateRow>>>,
    categories: Mutex<Vec<Category>>,
    /// job id -> (execution id, visible from the nth job fetch)
    execution_links: Mutex<HashMap<i64, (i64, u32)>>,
    /// execution id -> fetches remaining until Completed
    execution_scripts: Mutex<HashMap<i64, u32>>,
    upload_id: Mutex<Option<i64>>,
    confirm_delay: Mutex<Option<Duration>>,
    job_fetch_count: AtomicU32,
    execution_fetch_count: AtomicU32,
    upload_count: AtomicU32,
    confirm_count: AtomicU32,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            job_statuses: Mutex::new(HashMap::new()),
            job_counts: Mutex::new(HashMap::new()),
            rows: Mutex::new(HashMap::new()),
            categories: Mutex::new(Vec::new()),
            execution_links: Mutex::new(HashMap::new()),
            execution_scripts: Mutex::new(HashMap::new()),
            upload_id: Mutex::new(None),
            confirm_delay: Mutex::new(None),
            job_fetch_count: AtomicU32::new(0),
            execution_fetch_count: AtomicU32::new(0),
            upload_count: AtomicU32::new(0),
            confirm_count: AtomicU32::new(0),
        }
    }

    /// Queue the statuses successive `get_job` calls will report; the
    /// last one repeats once the queue drains.
    pub fn script_job_statuses(&self, job_id: i64, statuses: Vec<ImportJobStatus>) {
        self.job_statuses
            .lock()
            .insert(job_id, statuses.into_iter().collect());
    }

    pub fn set_job_counts(&self, job_id: i64, counts: RowCounts) {
        self.job_counts.lock().insert(job_id, counts);
    }

    pub fn set_rows(&self, job_id: i64, rows: Vec<CandidateRow>) {
        self.rows.lock().insert(job_id, rows);
    }

    pub fn set_categories(&self, categories: Vec<Category>) {
        *self.categories.lock() = categories;
    }

    /// Attach an execution reference to a job from the nth fetch onwards
    pub fn link_execution(&self, job_id: i64, execution_id: i64, from_fetch: u32) {
        self.execution_links
            .lock()
            .insert(job_id, (execution_id, from_fetch));
    }

    /// Script an execution to report Running until the nth fetch, then
    /// Completed.
    pub fn script_execution(&self, execution_id: i64, terminal_on_fetch: u32) {
        self.execution_scripts
            .lock()
            .insert(execution_id, terminal_on_fetch);
    }

    pub fn set_upload_id(&self, id: i64) {
        *self.upload_id.lock() = Some(id);
    }

    pub fn set_confirm_delay(&self, delay: Duration) {
        *self.confirm_delay.lock() = Some(delay);
    }

    pub fn job_fetches(&self) -> u32 {
        self.job_fetch_count.load(Ordering::SeqCst)
    }

    pub fn execution_fetches(&self) -> u32 {
        self.execution_fetch_count.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> u32 {
        self.upload_count.load(Ordering::SeqCst)
    }

    pub fn confirms(&self) -> u32 {
        self.confirm_count.load(Ordering::SeqCst)
    }
}

/// Build a valid candidate row for tests
pub fn make_row(row_number: u32, status: RowStatus) -> CandidateRow {
    CandidateRow {
        row_number,
        date: "2026-08-01".to_string(),
        amount: -25.00,
        kind: Some(TxnKind::Debit),
        description: format!("Transaction {}", row_number),
        category_label: None,
        notes: None,
        tags: vec![],
        status,
        matched_category_id: None,
        rule_applied: false,
    }
}

#[async_trait]
impl ImportApi for FakeApi {
    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt> {
        self.upload_count.fetch_add(1, Ordering::SeqCst);
        let id = (*self.upload_id.lock()).ok_or_else(|| {
            AppError::Internal(format!("No upload scripted for {}", request.file_name))
        })?;
        Ok(UploadReceipt {
            status: "UPLOADED".to_string(),
            id,
        })
    }

    async fn get_job(&self, job_id: i64) -> Result<ImportJob> {
        let fetch_n = self.job_fetch_count.fetch_add(1, Ordering::SeqCst) + 1;

        let status = {
            let mut scripts = self.job_statuses.lock();
            let queue = scripts
                .get_mut(&job_id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;
            if queue.len() > 1 {
                queue.pop_front().ok_or_else(|| {
                    AppError::Internal("Status script exhausted".to_string())
                })?
            } else {
                *queue
                    .front()
                    .ok_or_else(|| AppError::Internal("Status script empty".to_string()))?
            }
        };

        let scripted = self.job_counts.lock().get(&job_id).copied();
        let mut counts = match status {
            ImportJobStatus::Uploaded => RowCounts::default(),
            _ => scripted.unwrap_or_default(),
        };
        if status != ImportJobStatus::Completed {
            counts.imported = 0;
        }

        let job_execution_id = self
            .execution_links
            .lock()
            .get(&job_id)
            .filter(|(_, from)| fetch_n >= *from)
            .map(|(id, _)| *id);

        Ok(ImportJob {
            id: job_id,
            account_id: 7,
            file_name: "statement.csv".to_string(),
            file_size: 2048,
            status,
            counts,
            job_execution_id,
            error_message: match status {
                ImportJobStatus::Failed => Some("Import failed".to_string()),
                _ => None,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    async fn get_rows(&self, job_id: i64) -> Result<Vec<CandidateRow>> {
        self.rows
            .lock()
            .get(&job_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No rows for job {}", job_id)))
    }

    async fn confirm(&self, _job_id: i64, _skip_duplicates: bool) -> Result<()> {
        self.confirm_count.fetch_add(1, Ordering::SeqCst);
        let delay = *self.confirm_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn get_execution(&self, execution_id: i64) -> Result<BackgroundJobExecution> {
        let fetch_n = self.execution_fetch_count.fetch_add(1, Ordering::SeqCst) + 1;
        let terminal_on = self
            .execution_scripts
            .lock()
            .get(&execution_id)
            .copied()
            .unwrap_or(1);

        let done = fetch_n >= terminal_on;
        Ok(BackgroundJobExecution {
            id: execution_id,
            status: if done {
                ExecutionStatus::Completed
            } else {
                ExecutionStatus::Running
            },
            steps: vec![
                JobStep {
                    name: "parse".to_string(),
                    status: StepStatus::Completed,
                    started_at: Some(Utc::now()),
                    ended_at: Some(Utc::now()),
                },
                JobStep {
                    name: "persist".to_string(),
                    status: if done {
                        StepStatus::Completed
                    } else {
                        StepStatus::Running
                    },
                    started_at: Some(Utc::now()),
                    ended_at: None,
                },
            ],
            started_at: Utc::now(),
            ended_at: if done { Some(Utc::now()) } else { None },
        })
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.categories.lock().clone())
    }
}
