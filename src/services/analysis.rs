use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode};
use std::time::Duration;

use crate::models::job::{JobHandle, JobStatusSnapshot, SubmitVideoResponse};
use crate::models::video::UploadRequest;

/// The two calls the session needs from the remote analysis service.
///
/// Implementations perform network I/O only and never retry; retry and
/// backoff belong to the poller.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Upload a video and return the job it was queued under.
    async fn submit(&self, video: UploadRequest) -> Result<JobHandle, UploadError>;

    /// Fetch the current status of a job.
    async fn fetch_status(&self, job: &JobHandle) -> Result<JobStatusSnapshot, StatusFetchError>;
}

/// HTTP client for the apple counting service.
pub struct AnalysisClient {
    http: Client,
    submit_url: String,
    status_base_url: String,
}

impl AnalysisClient {
    pub fn new(
        submit_url: &str,
        status_base_url: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("apple-counter/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            submit_url: submit_url.to_string(),
            status_base_url: status_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn status_url(&self, job: &JobHandle) -> String {
        format!("{}/{}", self.status_base_url, job.as_str())
    }
}

#[async_trait]
impl AnalysisService for AnalysisClient {
    async fn submit(&self, video: UploadRequest) -> Result<JobHandle, UploadError> {
        tracing::debug!(
            file_name = %video.file_name,
            bytes = video.len(),
            "Submitting video for analysis"
        );

        let part = multipart::Part::bytes(video.bytes)
            .file_name(video.file_name)
            .mime_str(&video.mime_type)
            .map_err(UploadError::Transport)?;
        let form = multipart::Form::new().part("video", part);

        let response = self
            .http
            .post(&self.submit_url)
            .multipart(form)
            .send()
            .await
            .map_err(UploadError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected { status, body });
        }

        let body: SubmitVideoResponse = response.json().await.map_err(UploadError::Decode)?;
        tracing::debug!(job_status = ?body.status, "Submit accepted");

        body.job_id
            .and_then(JobHandle::new)
            .ok_or(UploadError::MissingJobId)
    }

    async fn fetch_status(&self, job: &JobHandle) -> Result<JobStatusSnapshot, StatusFetchError> {
        let response = self
            .http
            .get(self.status_url(job))
            .send()
            .await
            .map_err(StatusFetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StatusFetchError::Rejected { status, body });
        }

        response.json().await.map_err(StatusFetchError::Decode)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Failed to upload video: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to upload video: {status} - {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Failed to read upload response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("No job ID returned from server")]
    MissingJobId,
}

#[derive(Debug, thiserror::Error)]
pub enum StatusFetchError {
    #[error("Failed to get job status: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to get job status: {status} - {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Failed to read job status: {0}")]
    Decode(#[source] reqwest::Error),
}
