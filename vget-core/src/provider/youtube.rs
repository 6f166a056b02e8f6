use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, StreamCollector};
use crate::config::{BrowserSection, VgetConfig};
use crate::extractor::Extractor;
use crate::job::OutputType;
use crate::media::MediaTools;

use super::{fetch_to_file, hostname_matches, AcquireOutcome, Provider};

const YOUTUBE_DOMAINS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com", "youtu.be"];

const EXHAUSTION_GUIDANCE: &str = "Failed to download from YouTube. The platform may be \
    blocking automated requests. Try: 1) Provide a cookies file exported from your browser, \
    2) Try a different video URL, 3) Use the 'Upload File' option instead.";

/// What a single cascade step produced. Always a value: a step that blows up
/// internally reports `Failed` and the cascade moves on.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Fetched {
        path: PathBuf,
        duration_seconds: f64,
        title: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl StrategyOutcome {
    pub fn fetched(path: impl Into<PathBuf>, duration_seconds: f64, title: Option<String>) -> Self {
        StrategyOutcome::Fetched {
            path: path.into(),
            duration_seconds,
            title,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        StrategyOutcome::Failed {
            reason: reason.into(),
        }
    }
}

/// One independent way of acquiring media for a URL. The provider walks its
/// strategies in order and stops at the first `Fetched`.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(
        &self,
        url: &str,
        output_dir: &Path,
        output_type: OutputType,
        job_id: &str,
    ) -> StrategyOutcome;
}

/// Strategy A: drive a headless browser through playback and download
/// whichever stream the player requested.
pub struct BrowserCaptureStrategy {
    config: Arc<BrowserSection>,
    media: MediaTools,
}

impl BrowserCaptureStrategy {
    pub fn new(config: Arc<BrowserSection>, media: MediaTools) -> Self {
        Self { config, media }
    }

    fn build_client(&self) -> Result<reqwest::Client, String> {
        reqwest::Client::builder()
            .user_agent(self.config.user_agent.clone())
            .timeout(Duration::from_secs(self.config.download_timeout_seconds))
            .build()
            .map_err(|err| format!("http client construction failed: {err}"))
    }
}

#[async_trait]
impl AcquisitionStrategy for BrowserCaptureStrategy {
    fn name(&self) -> &'static str {
        "browser-capture"
    }

    async fn attempt(
        &self,
        url: &str,
        output_dir: &Path,
        output_type: OutputType,
        job_id: &str,
    ) -> StrategyOutcome {
        let client = match self.build_client() {
            Ok(client) => client,
            Err(reason) => return StrategyOutcome::failed(reason),
        };
        let session = match BrowserSession::launch(&self.config).await {
            Ok(session) => session,
            Err(err) => return StrategyOutcome::failed(format!("browser launch failed: {err}")),
        };
        let collector = StreamCollector::new(Arc::clone(&self.config));
        let collected = collector.collect(&session, url).await;
        if let Err(err) = session.shutdown().await {
            warn!(job_id = %job_id, error = %err, "browser shutdown reported an error");
        }
        let capture = match collected {
            Ok(capture) => capture,
            Err(err) => return StrategyOutcome::failed(format!("browser capture failed: {err}")),
        };

        // Muxed streams carry audio too, so a video capture still serves an
        // audio request. The reverse does not hold.
        let stream_url = match output_type {
            OutputType::Audio => capture
                .audio_url
                .as_deref()
                .or(capture.video_url.as_deref()),
            OutputType::Video => capture.video_url.as_deref(),
        };
        let Some(stream_url) = stream_url else {
            return StrategyOutcome::failed("no usable stream captured from playback");
        };

        let raw = output_dir.join(format!("{job_id}.capture"));
        if let Err(err) = fetch_to_file(&client, stream_url, &raw).await {
            return StrategyOutcome::failed(format!("stream download failed: {err}"));
        }

        let converted = match output_type {
            OutputType::Audio => self.media.extract_audio_wav(&raw, output_dir, job_id).await,
            OutputType::Video => self.media.remux_mp4(&raw, output_dir, job_id).await,
        };
        let _ = tokio::fs::remove_file(&raw).await;
        let path = match converted {
            Ok(path) => path,
            Err(err) => return StrategyOutcome::failed(format!("transcode failed: {err}")),
        };

        let duration = match capture.duration_seconds {
            Some(value) => value,
            None => self.media.probe_duration(&path).await.unwrap_or(0.0),
        };
        StrategyOutcome::fetched(path, duration, capture.title)
    }
}

/// Strategies B and C: the external extraction tool, with or without site
/// credentials.
pub struct ExtractorStrategy {
    extractor: Arc<Extractor>,
    media: MediaTools,
    use_cookies: bool,
}

impl ExtractorStrategy {
    pub fn new(extractor: Arc<Extractor>, media: MediaTools, use_cookies: bool) -> Self {
        Self {
            extractor,
            media,
            use_cookies,
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for ExtractorStrategy {
    fn name(&self) -> &'static str {
        if self.use_cookies {
            "extractor+cookies"
        } else {
            "extractor"
        }
    }

    async fn attempt(
        &self,
        url: &str,
        output_dir: &Path,
        output_type: OutputType,
        job_id: &str,
    ) -> StrategyOutcome {
        let fetched = match output_type {
            OutputType::Audio => {
                self.extractor
                    .fetch_audio(url, output_dir, job_id, self.use_cookies)
                    .await
            }
            OutputType::Video => {
                self.extractor
                    .fetch_video(url, output_dir, job_id, self.use_cookies)
                    .await
            }
        };
        match fetched {
            Ok(path) => {
                let duration = self.media.probe_duration(&path).await.unwrap_or(0.0);
                StrategyOutcome::fetched(path, duration, None)
            }
            Err(err) => StrategyOutcome::failed(format!("extraction tool failed: {err}")),
        }
    }
}

/// Strategy D: reserved slot for a second automation backend. Declines
/// cleanly until one is wired up.
pub struct AlternateBackendStrategy;

#[async_trait]
impl AcquisitionStrategy for AlternateBackendStrategy {
    fn name(&self) -> &'static str {
        "alternate-backend"
    }

    async fn attempt(
        &self,
        _url: &str,
        _output_dir: &Path,
        _output_type: OutputType,
        _job_id: &str,
    ) -> StrategyOutcome {
        debug!("alternate automation backend is not wired up");
        StrategyOutcome::failed("alternate automation backend is unavailable")
    }
}

/// The primary-source provider: an ordered cascade of independent
/// acquisition strategies, short-circuiting on first success.
pub struct YouTubeProvider {
    strategies: Vec<Arc<dyn AcquisitionStrategy>>,
}

impl YouTubeProvider {
    pub fn from_config(config: &VgetConfig) -> Self {
        let media = MediaTools::from_config(&config.media);
        let extractor = Arc::new(Extractor::from_config(config));
        let browser_config = Arc::new(config.browser.clone());

        let mut strategies: Vec<Arc<dyn AcquisitionStrategy>> = vec![
            Arc::new(BrowserCaptureStrategy::new(browser_config, media.clone())),
            Arc::new(ExtractorStrategy::new(
                Arc::clone(&extractor),
                media.clone(),
                true,
            )),
        ];
        // retry bare only when credentials were in play, in case the
        // credential file itself is the problem
        if extractor.cookies_available() {
            strategies.push(Arc::new(ExtractorStrategy::new(
                Arc::clone(&extractor),
                media.clone(),
                false,
            )));
        }
        strategies.push(Arc::new(AlternateBackendStrategy));

        let provider = Self { strategies };
        debug!(strategies = ?provider.strategy_names(), "youtube cascade assembled");
        provider
    }

    /// Test seam: run the cascade over caller-supplied strategies.
    pub fn with_strategies(strategies: Vec<Arc<dyn AcquisitionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl Provider for YouTubeProvider {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn matches(&self, url: &str) -> bool {
        hostname_matches(url, YOUTUBE_DOMAINS)
    }

    async fn acquire(
        &self,
        url: &str,
        output_dir: &Path,
        output_type: OutputType,
        job_id: &str,
    ) -> AcquireOutcome {
        for strategy in &self.strategies {
            info!(
                job_id = %job_id,
                strategy = strategy.name(),
                "attempting acquisition strategy"
            );
            match strategy.attempt(url, output_dir, output_type, job_id).await {
                StrategyOutcome::Fetched {
                    path,
                    duration_seconds,
                    title,
                } => {
                    info!(
                        job_id = %job_id,
                        strategy = strategy.name(),
                        path = %path.display(),
                        duration_seconds,
                        "acquisition strategy succeeded"
                    );
                    let mut metadata = HashMap::new();
                    metadata.insert("duration".to_string(), Value::from(duration_seconds));
                    metadata.insert(
                        "strategy".to_string(),
                        Value::String(strategy.name().to_string()),
                    );
                    if let Some(title) = title {
                        metadata.insert("title".to_string(), Value::String(title));
                    }
                    return AcquireOutcome::success(path, metadata);
                }
                StrategyOutcome::Failed { reason } => {
                    warn!(
                        job_id = %job_id,
                        strategy = strategy.name(),
                        reason = %reason,
                        "acquisition strategy failed"
                    );
                }
            }
        }
        warn!(job_id = %job_id, url = %url, "all acquisition strategies exhausted");
        AcquireOutcome::failure(EXHAUSTION_GUIDANCE)
    }
}
