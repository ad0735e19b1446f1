//! Wire payloads for the FinTrack REST backend
//!
//! Loosely-typed JSON shapes as the server sends them, converted into
//! validated domain models at this boundary.

use crate::error::{AppError, Result};
use crate::models::{
    BackgroundJobExecution, CandidateRow, Category, ExecutionStatus, ImportJob, ImportJobStatus,
    JobStep, RowCounts, RowStatus, StepStatus, TxnKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-side upload request (multipart)
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub account_id: i64,
    /// Document password for protected PDF statements
    pub password: Option<String>,
    /// Client-generated reference attached to the upload for tracing
    pub client_ref: Uuid,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, account_id: i64) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            account_id,
            password: None,
            client_ref: Uuid::new_v4(),
        }
    }
}

/// `POST /uploads` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub status: String,
    pub id: i64,
}

/// `POST /jobs/confirm` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub id: i64,
    pub skip_duplicates: bool,
}

/// Structured error body the backend returns on business failures
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
}

/// `GET /jobs/{id}` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub id: i64,
    pub account_id: i64,
    pub file_name: String,
    pub file_size: u64,
    pub status: ImportJobStatus,
    pub total_rows: u32,
    pub valid_rows: u32,
    pub duplicate_rows: u32,
    pub error_rows: u32,
    #[serde(default)]
    pub imported_rows: u32,
    pub job_execution_id: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobPayload> for ImportJob {
    type Error = AppError;

    fn try_from(payload: JobPayload) -> Result<ImportJob> {
        let job = ImportJob {
            id: payload.id,
            account_id: payload.account_id,
            file_name: payload.file_name,
            file_size: payload.file_size,
            status: payload.status,
            counts: RowCounts {
                total: payload.total_rows,
                valid: payload.valid_rows,
                duplicate: payload.duplicate_rows,
                error: payload.error_rows,
                imported: payload.imported_rows,
            },
            job_execution_id: payload.job_execution_id,
            error_message: payload.error_message,
            created_at: payload.created_at,
            updated_at: payload.updated_at,
        };
        job.validate()?;
        Ok(job)
    }
}

/// `GET /jobs/{id}/rows` element
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPayload {
    pub row_number: u32,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(rename = "type", default)]
    pub txn_type: String,
    #[serde(default)]
    pub description: String,
    pub category_name: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: RowStatus,
    pub matched_category_id: Option<i64>,
    #[serde(default)]
    pub rule_applied: bool,
}

impl From<RowPayload> for CandidateRow {
    fn from(payload: RowPayload) -> CandidateRow {
        CandidateRow {
            row_number: payload.row_number,
            date: payload.date,
            amount: payload.amount,
            kind: TxnKind::parse(&payload.txn_type),
            description: payload.description,
            category_label: payload.category_name,
            notes: payload.notes,
            tags: payload.tags,
            status: payload.status,
            matched_category_id: payload.matched_category_id,
            rule_applied: payload.rule_applied,
        }
    }
}

/// `GET /job-executions/{id}` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayload {
    pub id: i64,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub steps: Vec<StepPayload>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPayload {
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<ExecutionPayload> for BackgroundJobExecution {
    fn from(payload: ExecutionPayload) -> BackgroundJobExecution {
        BackgroundJobExecution {
            id: payload.id,
            status: payload.status,
            steps: payload
                .steps
                .into_iter()
                .map(|s| JobStep {
                    name: s.name,
                    status: s.status,
                    started_at: s.started_at,
                    ended_at: s.ended_at,
                })
                .collect(),
            started_at: payload.started_at,
            ended_at: payload.ended_at,
        }
    }
}

/// `GET /categories` element
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryPayload {
    pub id: i64,
    pub name: String,
}

impl From<CategoryPayload> for Category {
    fn from(payload: CategoryPayload) -> Category {
        Category {
            id: payload.id,
            name: payload.name,
        }
    }
}
