use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::config::VgetConfig;
use crate::job::OutputType;
use crate::media::MediaTools;

use super::{fetch_to_file, AcquireOutcome, Provider};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "avi", "mov", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "ogg", "flac", "aac"];
const PLAYLIST_EXTENSIONS: &[&str] = &["m3u8", "m3u"];

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Video,
    Audio,
    Playlist,
}

/// Judge a URL by the file extension of its path component. No I/O.
fn classify_extension(url: &str) -> Option<(MediaKind, String)> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path().to_lowercase();
    let extension = Path::new(&path).extension()?.to_str()?.to_string();
    let kind = if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        MediaKind::Video
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        MediaKind::Audio
    } else if PLAYLIST_EXTENSIONS.contains(&extension.as_str()) {
        MediaKind::Playlist
    } else {
        return None;
    };
    Some((kind, extension))
}

/// Provider for URLs that point straight at a media file or stream
/// playlist. Plain files are streamed to disk, playlists are handed to the
/// transcoder which consumes the playlist URL itself.
pub struct DirectMediaProvider {
    media: MediaTools,
}

impl DirectMediaProvider {
    pub fn from_config(config: &VgetConfig) -> Self {
        Self::new(MediaTools::from_config(&config.media))
    }

    pub fn new(media: MediaTools) -> Self {
        Self { media }
    }

    fn build_client() -> Result<reqwest::Client, String> {
        reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|err| format!("http client construction failed: {err}"))
    }

    async fn acquire_playlist(
        &self,
        url: &str,
        output_dir: &Path,
        output_type: OutputType,
        job_id: &str,
    ) -> AcquireOutcome {
        info!(job_id = %job_id, url = %url, "capturing stream playlist through transcoder");
        match self
            .media
            .capture_playlist(url, output_dir, job_id, output_type)
            .await
        {
            Ok(path) => {
                let mut metadata = HashMap::new();
                metadata.insert("source".to_string(), Value::String("hls_stream".into()));
                let duration = self.media.probe_duration(&path).await.unwrap_or(0.0);
                metadata.insert("duration".to_string(), Value::from(duration));
                AcquireOutcome::success(path, metadata)
            }
            Err(err) => AcquireOutcome::failure(format!("playlist capture failed: {err}")),
        }
    }
}

#[async_trait]
impl Provider for DirectMediaProvider {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn matches(&self, url: &str) -> bool {
        classify_extension(url).is_some()
    }

    async fn acquire(
        &self,
        url: &str,
        output_dir: &Path,
        output_type: OutputType,
        job_id: &str,
    ) -> AcquireOutcome {
        let Some((kind, extension)) = classify_extension(url) else {
            return AcquireOutcome::failure(
                "direct media url has no recognizable file extension",
            );
        };
        if kind == MediaKind::Playlist {
            return self
                .acquire_playlist(url, output_dir, output_type, job_id)
                .await;
        }

        let client = match Self::build_client() {
            Ok(client) => client,
            Err(reason) => return AcquireOutcome::failure(reason),
        };
        let download_path = output_dir.join(format!("{job_id}.{extension}"));
        info!(job_id = %job_id, url = %url, "downloading direct media file");
        let headers = match fetch_to_file(&client, url, &download_path).await {
            Ok(headers) => headers,
            Err(err) => return AcquireOutcome::failure(format!("direct download failed: {err}")),
        };

        let mut metadata = HashMap::new();
        if let Some(content_type) = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            metadata.insert(
                "content_type".to_string(),
                Value::String(content_type.to_string()),
            );
        }
        if let Some(length) = headers
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
        {
            metadata.insert("content_length".to_string(), Value::from(length));
        }

        let final_path = if output_type == OutputType::Audio && kind == MediaKind::Video {
            match self
                .media
                .extract_audio_wav(&download_path, output_dir, job_id)
                .await
            {
                Ok(path) => {
                    let _ = tokio::fs::remove_file(&download_path).await;
                    path
                }
                Err(err) => {
                    return AcquireOutcome::failure(format!("audio extraction failed: {err}"))
                }
            }
        } else {
            download_path
        };

        let duration = self.media.probe_duration(&final_path).await.unwrap_or(0.0);
        metadata.insert("duration".to_string(), Value::from(duration));
        AcquireOutcome::success(final_path, metadata)
    }
}
