use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use vget_core::{
    tiktok_provider, AcquireOutcome, FileJobStore, Job, JobEngine, JobError, OutputType, Provider,
    ProviderRegistry,
};

/// Provider double with a programmable outcome and an execution counter.
struct ScriptedProvider {
    fail_with: Option<&'static str>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    fn succeeding(calls: Arc<AtomicUsize>) -> Self {
        Self {
            fail_with: None,
            delay: Duration::ZERO,
            calls,
        }
    }

    fn failing(message: &'static str, calls: Arc<AtomicUsize>) -> Self {
        Self {
            fail_with: Some(message),
            delay: Duration::ZERO,
            calls,
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("scripted.example")
    }

    async fn acquire(
        &self,
        _url: &str,
        output_dir: &Path,
        _output_type: OutputType,
        job_id: &str,
    ) -> AcquireOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.fail_with {
            Some(message) => AcquireOutcome::failure(message),
            None => {
                let mut metadata = HashMap::new();
                metadata.insert("duration".to_string(), Value::from(123.4));
                AcquireOutcome::success(output_dir.join(format!("{job_id}.mp3")), metadata)
            }
        }
    }
}

fn build_engine(dir: &Path, provider: impl Provider + 'static) -> JobEngine {
    let store = FileJobStore::new(dir.join("jobs")).expect("store");
    let registry = Arc::new(ProviderRegistry::new(vec![Arc::new(provider)]));
    JobEngine::new(store, registry, dir.join("media"))
}

async fn wait_terminal(engine: &JobEngine, job_id: &str) -> Job {
    for _ in 0..200 {
        if let Some(job) = engine.status(job_id).await {
            if job.status.terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn submit_runs_acquisition_to_completion() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = build_engine(dir.path(), ScriptedProvider::succeeding(calls.clone()));

    let job = engine
        .submit("https://scripted.example/v/1", OutputType::Audio)
        .await
        .unwrap();
    assert_eq!(job.provider, "scripted");
    assert!(!job.status.terminal());

    let done = wait_terminal(&engine, &job.job_id).await;
    assert_eq!(done.status.as_str(), "completed");
    let output_path = done.output_path.expect("output path");
    assert!(output_path.ends_with(&format!("{}.mp3", job.job_id)));
    assert_eq!(done.metadata["duration"], Value::from(123.4));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn completed_url_is_reused_without_rescheduling() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = build_engine(dir.path(), ScriptedProvider::succeeding(calls.clone()));

    let first = engine
        .submit("https://scripted.example/v/2", OutputType::Audio)
        .await
        .unwrap();
    wait_terminal(&engine, &first.job_id).await;

    let second = engine
        .submit("https://scripted.example/v/2", OutputType::Audio)
        .await
        .unwrap();

    assert_eq!(second.job_id, first.job_id);
    assert_eq!(second.status.as_str(), "completed");
    // give any stray background task a chance to run before counting
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn resubmit_before_completion_creates_a_second_job() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = ScriptedProvider {
        fail_with: None,
        delay: Duration::from_millis(300),
        calls: calls.clone(),
    };
    let engine = build_engine(dir.path(), provider);

    let first = engine
        .submit("https://scripted.example/v/3", OutputType::Audio)
        .await
        .unwrap();
    let second = engine
        .submit("https://scripted.example/v/3", OutputType::Audio)
        .await
        .unwrap();

    assert_ne!(first.job_id, second.job_id);
    wait_terminal(&engine, &first.job_id).await;
    wait_terminal(&engine, &second.job_id).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failing_provider_leaves_a_failed_job_with_message() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = build_engine(
        dir.path(),
        ScriptedProvider::failing("the upstream said no", calls),
    );

    let job = engine
        .submit("https://scripted.example/v/4", OutputType::Video)
        .await
        .unwrap();
    let done = wait_terminal(&engine, &job.job_id).await;

    assert_eq!(done.status.as_str(), "failed");
    assert_eq!(done.error_message.as_deref(), Some("the upstream said no"));
    assert!(done.output_path.is_none());
}

#[tokio::test]
async fn unresolvable_url_fails_synchronously_without_a_record() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = build_engine(dir.path(), ScriptedProvider::succeeding(calls.clone()));

    let err = engine
        .submit("https://video.example/watch?v=abc", OutputType::Audio)
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::NoProviderMatched { .. }));
    assert!(engine
        .find_by_url("https://video.example/watch?v=abc")
        .await
        .is_none());
    let records = std::fs::read_dir(dir.path().join("jobs")).unwrap().count();
    assert_eq!(records, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stub_provider_fails_fast_with_upload_guidance() {
    let dir = TempDir::new().unwrap();
    let store = FileJobStore::new(dir.path().join("jobs")).expect("store");
    let registry = Arc::new(ProviderRegistry::new(vec![Arc::new(tiktok_provider())]));
    let engine = JobEngine::new(store, registry, dir.path().join("media"));

    let job = engine
        .submit("https://vm.tiktok.com/ZM8abc/", OutputType::Video)
        .await
        .unwrap();
    assert_eq!(job.provider, "tiktok");

    let done = wait_terminal(&engine, &job.job_id).await;
    assert_eq!(done.status.as_str(), "failed");
    let message = done.error_message.expect("guidance");
    assert!(message.contains("not yet implemented"));
    assert!(message.contains("Upload File"));
}
