//! Domain models for the import workflow
//!
//! Explicit, validated types for everything crossing the REST boundary:
//! import jobs, candidate rows pending review, and background job
//! executions. Construction from wire payloads lives in `crate::api`.

use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an import job
///
/// The progression is forward-only; `Failed` is reachable from any
/// non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportJobStatus {
    Uploaded,
    Extracted,
    Previewed,
    Committing,
    Completed,
    Failed,
}

impl ImportJobStatus {
    /// Position in the forward progression (Failed sorts last)
    fn rank(&self) -> u8 {
        match self {
            ImportJobStatus::Uploaded => 0,
            ImportJobStatus::Extracted => 1,
            ImportJobStatus::Previewed => 2,
            ImportJobStatus::Committing => 3,
            ImportJobStatus::Completed => 4,
            ImportJobStatus::Failed => 5,
        }
    }

    /// Whether no further automatic transition can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportJobStatus::Completed | ImportJobStatus::Failed)
    }

    /// Whether the job has reached (or passed) a milestone in the
    /// progression. Failed never counts as having reached anything.
    pub fn has_reached(&self, milestone: ImportJobStatus) -> bool {
        !matches!(self, ImportJobStatus::Failed) && self.rank() >= milestone.rank()
    }

    /// Whether a transition from `self` to `next` respects the progression
    pub fn can_advance_to(&self, next: ImportJobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == ImportJobStatus::Failed {
            return true;
        }
        next.rank() > self.rank()
    }
}

/// Row counts reported by the server for one import job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounts {
    pub total: u32,
    pub valid: u32,
    pub duplicate: u32,
    pub error: u32,
    pub imported: u32,
}

/// One upload-to-commit lifecycle, owned by the server
///
/// The client holds a read-mostly cached copy; polled snapshots are
/// applied through [`ImportJob::apply_update`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: i64,
    pub account_id: i64,
    pub file_name: String,
    pub file_size: u64,
    pub status: ImportJobStatus,
    pub counts: RowCounts,
    pub job_execution_id: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// Check the count invariant: once extraction has completed,
    /// total = valid + duplicate + error.
    pub fn validate(&self) -> Result<()> {
        if self.status.rank() >= ImportJobStatus::Extracted.rank()
            && self.status != ImportJobStatus::Failed
        {
            // Wire-controlled counts; sum wide so bogus values fail
            // validation instead of overflowing
            let sum = u64::from(self.counts.valid)
                + u64::from(self.counts.duplicate)
                + u64::from(self.counts.error);
            if u64::from(self.counts.total) != sum {
                return Err(AppError::Validation(format!(
                    "Inconsistent row counts for job {}: total {} != {} valid + {} duplicate + {} error",
                    self.id, self.counts.total, self.counts.valid, self.counts.duplicate, self.counts.error
                )));
            }
        }
        Ok(())
    }

    /// Apply a freshly polled snapshot to this cached copy.
    ///
    /// A snapshot that would move the status backwards is ignored (the
    /// server owns the job; a regression means we raced a stale read).
    /// Returns whether the snapshot was applied.
    pub fn apply_update(&mut self, snapshot: ImportJob) -> bool {
        if snapshot.status != self.status && !self.status.can_advance_to(snapshot.status) {
            tracing::warn!(
                "Ignoring stale snapshot for job {}: {:?} -> {:?}",
                self.id,
                self.status,
                snapshot.status
            );
            return false;
        }
        *self = snapshot;
        true
    }
}

/// Review status of one candidate row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Valid,
    Duplicate,
    Error,
}

/// Transaction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnKind {
    Credit,
    Debit,
}

impl TxnKind {
    /// Parse a wire string, case-insensitive
    pub fn parse(s: &str) -> Option<TxnKind> {
        match s.to_ascii_lowercase().as_str() {
            "credit" => Some(TxnKind::Credit),
            "debit" => Some(TxnKind::Debit),
            _ => None,
        }
    }
}

/// One parsed record pending confirmation
///
/// Rows are transient: they exist between preview-fetch and commit and
/// are superseded once committed. Edits mutate local state only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRow {
    pub row_number: u32,
    /// Extracted date text, expected ISO (yyyy-mm-dd)
    pub date: String,
    pub amount: f64,
    pub kind: Option<TxnKind>,
    pub description: String,
    /// Category name guessed by extraction or assigned by a rule
    pub category_label: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub status: RowStatus,
    /// Id of the category whose name equals `category_label`, if any
    pub matched_category_id: Option<i64>,
    /// Whether a prior rule auto-assigned the category
    pub rule_applied: bool,
}

impl CandidateRow {
    /// Validity constraints a row must satisfy before its fields can
    /// count towards an import: parseable ISO date, finite non-zero
    /// amount, known transaction kind, non-empty description.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").is_err() {
            errors.push(format!("Invalid date: '{}'", self.date));
        }
        if !self.amount.is_finite() || self.amount == 0.0 {
            errors.push(format!("Invalid amount: {}", self.amount));
        }
        if self.kind.is_none() {
            errors.push("Unknown transaction type".to_string());
        }
        if self.description.trim().is_empty() {
            errors.push("Description is required".to_string());
        }

        errors
    }

    /// Whether the row's fields pass fresh-upload validation
    pub fn fields_valid(&self) -> bool {
        self.validation_errors().is_empty()
    }
}

/// Transaction category (for label -> id matching during review)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Overall status of a background pipeline execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// Status of one step within an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One step of a background pipeline (e.g. parse, dedupe, persist)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStep {
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Server-side record of one execution of an asynchronous pipeline
///
/// Read-only from the client; polled until terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundJobExecution {
    pub id: i64,
    pub status: ExecutionStatus,
    pub steps: Vec<JobStep>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}
