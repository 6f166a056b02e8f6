use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};

use super::models::{Job, JobStatus, JobUpdate, OutputType};
use super::{JobError, JobResult};

#[derive(Debug, Clone)]
pub struct FileJobStoreBuilder {
    root: Option<PathBuf>,
    create_if_missing: bool,
}

impl Default for FileJobStoreBuilder {
    fn default() -> Self {
        Self {
            root: None,
            create_if_missing: true,
        }
    }
}

impl FileJobStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, root: impl AsRef<Path>) -> Self {
        self.root = Some(root.as_ref().to_path_buf());
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> JobResult<FileJobStore> {
        let root = self.root.ok_or(JobError::MissingStore)?;
        if self.create_if_missing {
            std::fs::create_dir_all(&root)?;
        }
        Ok(FileJobStore { root })
    }
}

/// One JSON file per job under the store root. A record is rewritten through
/// a temporary sibling and renamed into place, so readers only ever see a
/// complete record at the canonical path.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    root: PathBuf,
}

impl FileJobStore {
    pub fn builder() -> FileJobStoreBuilder {
        FileJobStoreBuilder::new()
    }

    pub fn new(root: impl AsRef<Path>) -> JobResult<Self> {
        FileJobStoreBuilder::new().root(root).build()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn create(
        &self,
        url: &str,
        provider: &str,
        output_type: OutputType,
    ) -> JobResult<Job> {
        let job = Job::new(url, provider, output_type);
        self.persist(&job).await?;
        info!(job_id = %job.job_id, url = %job.url, provider = %job.provider, "created job");
        Ok(job)
    }

    /// Absence and corruption are the same thing to callers. A record that
    /// fails to read or parse is logged and reported as `None`.
    pub async fn get(&self, job_id: &str) -> Option<Job> {
        let path = self.record_path(job_id);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read job record");
                return None;
            }
        };
        match serde_json::from_slice(&contents) {
            Ok(job) => Some(job),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt job record treated as absent");
                None
            }
        }
    }

    /// First persisted job with a matching URL, counting only completed
    /// records. Linear scan over the store directory.
    pub async fn find_by_url(&self, url: &str) -> Option<Job> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %self.root.display(), error = %err, "failed to scan job store");
                return None;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Some(job) = self.get(stem).await {
                if job.url == url && job.status == JobStatus::Completed {
                    debug!(job_id = %job.job_id, url = %url, "found completed job for url");
                    return Some(job);
                }
            }
        }
        None
    }

    /// Applies only the supplied fields, merges metadata key-by-key and
    /// refreshes `updated_at`. Returns whether the record existed.
    pub async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        update: JobUpdate,
    ) -> JobResult<bool> {
        let Some(mut job) = self.get(job_id).await else {
            return Ok(false);
        };
        job.status = status;
        if let Some(output_path) = update.output_path {
            job.output_path = Some(output_path);
        }
        if let Some(metadata) = update.metadata {
            job.metadata.extend(metadata);
        }
        if let Some(message) = update.error_message {
            job.error_message = Some(message);
        }
        job.updated_at = Utc::now();
        self.persist(&job).await?;
        debug!(job_id = %job_id, status = %status, "updated job status");
        Ok(true)
    }

    fn record_path(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{job_id}.json"))
    }

    async fn persist(&self, job: &Job) -> JobResult<()> {
        let path = self.record_path(&job.job_id);
        let staged = self.root.join(format!("{}.tmp", job.job_id));
        let payload = serde_json::to_vec_pretty(job)?;
        fs::write(&staged, payload).await?;
        fs::rename(&staged, &path).await?;
        Ok(())
    }
}
