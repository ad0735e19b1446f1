//! HTTP implementation of the backend boundary

use crate::api::types::{
    ApiErrorBody, CategoryPayload, ConfirmRequest, ExecutionPayload, JobPayload, RowPayload,
    UploadReceipt, UploadRequest,
};
use crate::api::ImportApi;
use crate::error::{AppError, Result};
use crate::models::{BackgroundJobExecution, CandidateRow, Category, ImportJob};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;
use url::Url;

/// REST client against the FinTrack backend
#[derive(Debug)]
pub struct HttpImportApi {
    client: Client,
    base_url: String,
}

impl HttpImportApi {
    /// Create a client for the given base URL
    pub fn new(base_url: &str) -> Result<Self> {
        // Validate up front so a bad URL fails at startup, not mid-wizard
        let parsed = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid backend URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Map a non-2xx response to an error, surfacing the backend's
    /// structured message verbatim when one is present.
    async fn error_from(response: reqwest::Response) -> AppError {
        let status = response.status();
        match response.json::<ApiErrorBody>().await {
            Ok(body) => AppError::Business(body.message),
            Err(_) => AppError::Internal(format!("Backend returned HTTP {}", status)),
        }
    }
}

#[async_trait]
impl ImportApi for HttpImportApi {
    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt> {
        debug!(
            "Uploading {} ({} bytes) for account {}",
            request.file_name,
            request.bytes.len(),
            request.account_id
        );

        let file_part = Part::bytes(request.bytes).file_name(request.file_name);
        let mut form = Form::new()
            .part("file", file_part)
            .text("accountId", request.account_id.to_string())
            .text("clientRef", request.client_ref.to_string());
        if let Some(password) = request.password {
            form = form.text("password", password);
        }

        let response = self
            .client
            .post(self.endpoint("uploads"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(response.json::<UploadReceipt>().await?)
    }

    async fn get_job(&self, job_id: i64) -> Result<ImportJob> {
        let response = self
            .client
            .get(self.endpoint(&format!("jobs/{}", job_id)))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Job {} not found", job_id)));
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let payload = response.json::<JobPayload>().await?;
        ImportJob::try_from(payload)
    }

    async fn get_rows(&self, job_id: i64) -> Result<Vec<CandidateRow>> {
        let response = self
            .client
            .get(self.endpoint(&format!("jobs/{}/rows", job_id)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let payloads = response.json::<Vec<RowPayload>>().await?;
        Ok(payloads.into_iter().map(CandidateRow::from).collect())
    }

    async fn confirm(&self, job_id: i64, skip_duplicates: bool) -> Result<()> {
        let request = ConfirmRequest {
            id: job_id,
            skip_duplicates,
        };

        let response = self
            .client
            .post(self.endpoint("jobs/confirm"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(())
    }

    async fn get_execution(&self, execution_id: i64) -> Result<BackgroundJobExecution> {
        let response = self
            .client
            .get(self.endpoint(&format!("job-executions/{}", execution_id)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let payload = response.json::<ExecutionPayload>().await?;
        Ok(BackgroundJobExecution::from(payload))
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let response = self.client.get(self.endpoint("categories")).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let payloads = response.json::<Vec<CategoryPayload>>().await?;
        Ok(payloads.into_iter().map(Category::from).collect())
    }
}
