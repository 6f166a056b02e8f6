use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::provider::{AcquireOutcome, ProviderRegistry};

use super::models::{Job, JobStatus, JobUpdate, OutputType};
use super::store::FileJobStore;
use super::{JobError, JobResult};

/// Lifecycle orchestrator. `submit` reuses or creates a job and hands the
/// work to a detached task; the task owns every later mutation of that job.
#[derive(Clone)]
pub struct JobEngine {
    store: FileJobStore,
    registry: Arc<ProviderRegistry>,
    media_dir: PathBuf,
}

impl JobEngine {
    pub fn new(
        store: FileJobStore,
        registry: Arc<ProviderRegistry>,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        let media_dir = media_dir.into();
        let _ = std::fs::create_dir_all(&media_dir);
        Self {
            store,
            registry,
            media_dir,
        }
    }

    /// Create-or-reuse. A completed job for the same URL is returned as-is
    /// and nothing is scheduled. An unresolvable URL fails synchronously
    /// without persisting anything.
    pub async fn submit(&self, url: &str, output_type: OutputType) -> JobResult<Job> {
        if let Some(existing) = self.store.find_by_url(url).await {
            info!(job_id = %existing.job_id, url = %url, "reusing completed job");
            return Ok(existing);
        }

        let provider = self
            .registry
            .resolve(url)
            .ok_or_else(|| JobError::NoProviderMatched {
                url: url.to_string(),
            })?;

        let job = self.store.create(url, provider.name(), output_type).await?;

        let engine = self.clone();
        let job_id = job.job_id.clone();
        let job_url = job.url.clone();
        tokio::spawn(async move {
            engine.run(&job_id, &job_url, output_type).await;
        });

        Ok(job)
    }

    /// Background execution body. Nothing escapes this function: every
    /// failure path degrades to a logged `failed` status write, because the
    /// only observer is a later status read.
    pub async fn run(&self, job_id: &str, url: &str, output_type: OutputType) {
        match self
            .store
            .update_status(job_id, JobStatus::Running, JobUpdate::default())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(job_id = %job_id, "job record missing before execution");
                return;
            }
            Err(err) => {
                error!(job_id = %job_id, error = %err, "failed to mark job running");
                return;
            }
        }

        info!(job_id = %job_id, url = %url, output_type = %output_type, "starting acquisition");

        let outcome = match self.registry.resolve(url) {
            Some(provider) => {
                provider
                    .acquire(url, &self.media_dir, output_type, job_id)
                    .await
            }
            None => AcquireOutcome::failure("No suitable provider found for this URL"),
        };

        let (status, update) = match outcome {
            AcquireOutcome::Success {
                output_path,
                metadata,
            } => {
                info!(job_id = %job_id, path = %output_path.display(), "acquisition completed");
                (
                    JobStatus::Completed,
                    JobUpdate::with_output(output_path.to_string_lossy(), metadata),
                )
            }
            AcquireOutcome::Failure { message } => {
                warn!(job_id = %job_id, error = %message, "acquisition failed");
                (JobStatus::Failed, JobUpdate::with_error(message))
            }
        };

        match self.store.update_status(job_id, status, update).await {
            Ok(true) => {}
            Ok(false) => warn!(job_id = %job_id, "job record vanished during execution"),
            Err(err) => {
                error!(job_id = %job_id, error = %err, "failed to persist terminal status")
            }
        }
    }

    pub async fn status(&self, job_id: &str) -> Option<Job> {
        self.store.get(job_id).await
    }

    pub async fn find_by_url(&self, url: &str) -> Option<Job> {
        self.store.find_by_url(url).await
    }

    pub fn media_dir(&self) -> &PathBuf {
        &self.media_dir
    }
}
