use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vget_core::{Job, JobStatus, OutputType};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub url: String,
    pub output_type: OutputType,
}

#[derive(Debug, Deserialize)]
pub struct FindQuery {
    pub url: String,
}

/// Submission acknowledgement. Same shape whether the job was created or an
/// existing completed one was reused; the HTTP status code tells them apart.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub url: String,
    pub provider: String,
}

impl From<&Job> for SubmitResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            status: job.status,
            url: job.url.clone(),
            provider: job.provider.clone(),
        }
    }
}

/// Full job projection for status reads. The artifact's absolute path stays
/// internal; completed jobs expose a `/media/` download URL instead.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: String,
    pub status: JobStatus,
    pub url: String,
    pub provider: String,
    pub output_type: OutputType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub metadata: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        let download_url = match job.status {
            JobStatus::Completed => job
                .output_path
                .as_deref()
                .and_then(|path| Path::new(path).file_name())
                .and_then(|name| name.to_str())
                .map(|name| format!("/media/{name}")),
            _ => None,
        };
        Self {
            job_id: job.job_id,
            status: job.status,
            url: job.url,
            provider: job.provider,
            output_type: job.output_type,
            download_url,
            metadata: job.metadata,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
