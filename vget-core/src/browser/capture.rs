use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::page::Page;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};
use url::Url;

use crate::config::BrowserSection;

use super::error::{BrowserError, BrowserResult};
use super::session::BrowserSession;

/// Candidate stream URLs plus best-effort page metadata harvested from one
/// playback attempt.
#[derive(Debug, Clone, Default)]
pub struct StreamCapture {
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
}

impl StreamCapture {
    pub fn has_stream(&self) -> bool {
        self.audio_url.is_some() || self.video_url.is_some()
    }
}

/// Drives a page through navigation and playback settling, then reads the
/// recorded requests out of the network hook.
pub struct StreamCollector {
    config: Arc<BrowserSection>,
    duration_regex: Regex,
}

impl StreamCollector {
    pub fn new(config: Arc<BrowserSection>) -> Self {
        Self {
            config,
            duration_regex: duration_label_regex(),
        }
    }

    pub async fn collect(
        &self,
        session: &BrowserSession,
        url: &str,
    ) -> BrowserResult<StreamCapture> {
        let page = session.new_page().await?;
        navigate(
            &page,
            url,
            Duration::from_secs(self.config.navigation_timeout_seconds),
        )
        .await?;

        let wait = self.capture_wait();
        debug!(wait_ms = wait.as_millis() as u64, "waiting for playback requests");
        sleep(wait).await;

        let payload: CapturePayload = page
            .evaluate(CAPTURE_SCRIPT)
            .await
            .map_err(|err| {
                BrowserError::Network(format!("failed to capture network payload: {err}"))
            })?
            .into_value()
            .map_err(|err| {
                BrowserError::Network(format!("failed to decode capture payload: {err}"))
            })?;

        let capture = capture_from_payload(payload, &self.duration_regex);
        info!(
            audio = capture.audio_url.is_some(),
            video = capture.video_url.is_some(),
            title = capture.title.as_deref().unwrap_or(""),
            "stream capture finished"
        );
        Ok(capture)
    }

    fn capture_wait(&self) -> Duration {
        let [low, high] = self.config.capture_jitter_ms;
        let jitter = rand::thread_rng().gen_range(low..=high);
        Duration::from_millis(self.config.capture_wait_seconds * 1000 + jitter)
    }
}

async fn navigate(page: &Page, url: &str, ceiling: Duration) -> BrowserResult<()> {
    let params = NavigateParams::builder()
        .url(url)
        .build()
        .map_err(BrowserError::Configuration)?;
    let navigation = async {
        page.goto(params).await?;
        page.wait_for_navigation().await?;
        Ok::<_, BrowserError>(())
    };
    match timeout(ceiling, navigation).await {
        Ok(result) => result,
        Err(_) => Err(BrowserError::Timeout("page navigation".into())),
    }
}

#[derive(Debug, Deserialize)]
struct CapturePayload {
    current: Option<String>,
    captured: Vec<CapturedRequest>,
    sources: Vec<VideoSource>,
    title: Option<String>,
    duration_label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CapturedRequest {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideoSource {
    url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Audio,
    Video,
}

const VIDEO_ITAGS: [&str; 2] = ["18", "22"];
const AUDIO_ITAGS: [&str; 1] = ["140"];

/// Classify a recorded request as an audio- or video-bearing stream. Only
/// googlevideo/videoplayback URLs qualify, judged by their `mime` and
/// `itag` query parameters.
fn classify_stream(url: &str) -> Option<StreamKind> {
    if !url.contains("googlevideo.com") && !url.contains("videoplayback") {
        return None;
    }
    let parsed = Url::parse(url).ok()?;
    let mut itag = String::new();
    let mut mime = String::new();
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "itag" => itag = value.into_owned(),
            "mime" => mime = value.into_owned(),
            _ => {}
        }
    }
    if mime.starts_with("video/") || VIDEO_ITAGS.contains(&itag.as_str()) {
        Some(StreamKind::Video)
    } else if mime.starts_with("audio/") || AUDIO_ITAGS.contains(&itag.as_str()) {
        Some(StreamKind::Audio)
    } else {
        None
    }
}

fn capture_from_payload(payload: CapturePayload, duration_regex: &Regex) -> StreamCapture {
    let mut capture = StreamCapture::default();
    for request in &payload.captured {
        match classify_stream(&request.url) {
            Some(StreamKind::Video) if capture.video_url.is_none() => {
                capture.video_url = Some(request.url.clone());
            }
            Some(StreamKind::Audio) if capture.audio_url.is_none() => {
                capture.audio_url = Some(request.url.clone());
            }
            _ => {}
        }
    }
    if capture.video_url.is_none() {
        // blob: sources come from MSE and cannot be fetched over HTTP
        let direct = payload
            .current
            .iter()
            .chain(payload.sources.iter().map(|source| &source.url))
            .find(|url| !url.is_empty() && !url.starts_with("blob:"));
        capture.video_url = direct.cloned();
    }
    capture.title = payload
        .title
        .as_deref()
        .map(clean_title)
        .filter(|title| !title.is_empty());
    capture.duration_seconds = payload
        .duration_label
        .as_deref()
        .and_then(|label| parse_duration_label(duration_regex, label));
    capture
}

fn clean_title(raw: &str) -> String {
    raw.trim().trim_end_matches(" - YouTube").trim().to_string()
}

/// Player labels look like `12:34` or `1:02:03`.
fn duration_label_regex() -> Regex {
    Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{2})$").expect("valid regex")
}

fn parse_duration_label(regex: &Regex, label: &str) -> Option<f64> {
    let caps = regex.captures(label.trim())?;
    let hours = match caps.get(1) {
        Some(m) => m.as_str().parse::<u64>().ok()?,
        None => 0,
    };
    let minutes = caps[2].parse::<u64>().ok()?;
    let seconds = caps[3].parse::<u64>().ok()?;
    Some((hours * 3600 + minutes * 60 + seconds) as f64)
}

const CAPTURE_SCRIPT: &str = r#"
(() => {
    const video = document.querySelector('video');
    const captured = Array.from(window.__vgetCapturedRequests || []);
    const sources = [];
    if (video) {
        if (video.currentSrc) {
            sources.push({ url: video.currentSrc });
        }
        video.querySelectorAll('source').forEach(src => {
            const srcUrl = src.src || (src.dataset ? src.dataset.src : '');
            if (srcUrl) {
                sources.push({ url: srcUrl });
            }
        });
    }
    const timeElement = document.querySelector('.ytp-time-duration');
    return {
        current: video ? (video.currentSrc || null) : null,
        captured,
        sources,
        title: document.title || null,
        duration_label: timeElement ? timeElement.textContent : null,
    };
})()
"#;
