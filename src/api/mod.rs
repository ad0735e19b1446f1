//! REST backend boundary

pub mod types;
mod client;

pub use client::HttpImportApi;
pub use types::{UploadReceipt, UploadRequest};

use crate::error::Result;
use crate::models::{BackgroundJobExecution, CandidateRow, Category, ImportJob};
use async_trait::async_trait;

/// Operations the import workflow needs from the backend
///
/// The concrete implementation is [`HttpImportApi`]; tests substitute
/// in-memory fakes.
#[async_trait]
pub trait ImportApi: Send + Sync {
    /// Submit a statement file for asynchronous extraction
    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt>;

    /// Fetch the current snapshot of an import job
    async fn get_job(&self, job_id: i64) -> Result<ImportJob>;

    /// Fetch the ordered candidate rows extracted for a job
    async fn get_rows(&self, job_id: i64) -> Result<Vec<CandidateRow>>;

    /// Trigger the asynchronous commit of a previewed job
    async fn confirm(&self, job_id: i64, skip_duplicates: bool) -> Result<()>;

    /// Fetch step-level detail of a background pipeline execution
    async fn get_execution(&self, execution_id: i64) -> Result<BackgroundJobExecution>;

    /// Fetch the category catalog for label matching during review
    async fn list_categories(&self) -> Result<Vec<Category>>;
}
