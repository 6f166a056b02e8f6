use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Audio,
    Video,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Audio => "audio",
            OutputType::Video => "video",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(OutputType::Audio),
            "video" => Ok(OutputType::Video),
            other => Err(format!("unknown output type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub job_id: String,
    pub url: String,
    pub provider: String,
    pub status: JobStatus,
    pub output_type: OutputType,
    pub output_path: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        url: impl Into<String>,
        provider: impl Into<String>,
        output_type: OutputType,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            url: url.into(),
            provider: provider.into(),
            status: JobStatus::Pending,
            output_type,
            output_path: None,
            metadata: HashMap::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub output_path: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
    pub error_message: Option<String>,
}

impl JobUpdate {
    pub fn with_output(path: impl Into<String>, metadata: HashMap<String, Value>) -> Self {
        Self {
            output_path: Some(path.into()),
            metadata: Some(metadata),
            error_message: None,
        }
    }

    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            output_path: None,
            metadata: None,
            error_message: Some(message.into()),
        }
    }
}
