use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::warn;

use crate::config::MediaSection;
use crate::job::OutputType;

/// Result alias for media tool operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors produced while invoking ffmpeg.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media command failed ({command}): {stderr}")]
    CommandFailure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("media command timed out after {0:?}")]
    Timeout(Duration),
    #[error("media command produced no usable output at {}", path.display())]
    MissingOutput { path: PathBuf },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<std::process::Output>;
}

#[derive(Debug, Default)]
pub struct SystemCommandExecutor;

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<std::process::Output> {
        Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
    }
}

/// ffmpeg/ffprobe front-end shared by the providers.
#[derive(Clone)]
pub struct MediaTools {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    convert_timeout: Duration,
    probe_timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
}

impl fmt::Debug for MediaTools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTools")
            .field("ffmpeg", &self.ffmpeg)
            .field("ffprobe", &self.ffprobe)
            .field("convert_timeout", &self.convert_timeout)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl MediaTools {
    pub fn from_config(config: &MediaSection) -> Self {
        Self {
            ffmpeg: PathBuf::from(&config.ffmpeg_binary),
            ffprobe: PathBuf::from(&config.ffprobe_binary),
            convert_timeout: Duration::from_secs(config.convert_timeout_seconds),
            probe_timeout: Duration::from_secs(config.probe_timeout_seconds),
            executor: Arc::new(SystemCommandExecutor),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Duration of a media file in seconds. `None` when ffprobe is absent,
    /// fails, times out, or reports nothing usable.
    pub async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            path.display().to_string(),
        ];
        let future = timeout(self.probe_timeout, self.executor.run(&self.ffprobe, &args));
        match future.await {
            Ok(Ok(output)) if output.status.success() => {
                match serde_json::from_slice::<FfprobeOutput>(&output.stdout) {
                    Ok(parsed) => parsed
                        .format
                        .duration
                        .as_deref()
                        .and_then(|value| value.parse::<f64>().ok()),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "unparsable ffprobe payload");
                        None
                    }
                }
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(path = %path.display(), "ffprobe returned non-zero status: {stderr}");
                None
            }
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("ffprobe binary not found, duration unknown");
                None
            }
            Ok(Err(err)) => {
                warn!(path = %path.display(), error = %err, "ffprobe invocation failed");
                None
            }
            Err(_) => {
                warn!(path = %path.display(), timeout = ?self.probe_timeout, "ffprobe timed out");
                None
            }
        }
    }

    /// Transcode to 16 kHz mono WAV. Falls back to an MP3 encode when the
    /// WAV pass fails.
    pub async fn extract_audio_wav(
        &self,
        input: &Path,
        output_dir: &Path,
        stem: &str,
    ) -> MediaResult<PathBuf> {
        let wav = output_dir.join(format!("{stem}.wav"));
        let args = vec![
            "-i".to_string(),
            input.display().to_string(),
            "-ar".to_string(),
            "16000".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-y".to_string(),
            wav.display().to_string(),
        ];
        match self.run_ffmpeg(args, &wav).await {
            Ok(()) => Ok(wav),
            Err(err @ (MediaError::CommandFailure { .. } | MediaError::MissingOutput { .. })) => {
                warn!(input = %input.display(), error = %err, "wav transcode failed, retrying as mp3");
                let mp3 = output_dir.join(format!("{stem}.mp3"));
                let args = vec![
                    "-i".to_string(),
                    input.display().to_string(),
                    "-acodec".to_string(),
                    "libmp3lame".to_string(),
                    "-y".to_string(),
                    mp3.display().to_string(),
                ];
                self.run_ffmpeg(args, &mp3).await?;
                Ok(mp3)
            }
            Err(err) => Err(err),
        }
    }

    /// Re-encode to a loudness-normalized mono MP3 for speech pipelines.
    pub async fn normalize_mp3(
        &self,
        input: &Path,
        output_dir: &Path,
        stem: &str,
    ) -> MediaResult<PathBuf> {
        let mp3 = output_dir.join(format!("{stem}.mp3"));
        let args = vec![
            "-i".to_string(),
            input.display().to_string(),
            "-acodec".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            "44100".to_string(),
            "-af".to_string(),
            "loudnorm".to_string(),
            "-y".to_string(),
            mp3.display().to_string(),
        ];
        self.run_ffmpeg(args, &mp3).await?;
        Ok(mp3)
    }

    /// Remux into an MP4 container without re-encoding.
    pub async fn remux_mp4(
        &self,
        input: &Path,
        output_dir: &Path,
        stem: &str,
    ) -> MediaResult<PathBuf> {
        let mp4 = output_dir.join(format!("{stem}.mp4"));
        let args = vec![
            "-i".to_string(),
            input.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-y".to_string(),
            mp4.display().to_string(),
        ];
        self.run_ffmpeg(args, &mp4).await?;
        Ok(mp4)
    }

    /// Pull a stream playlist straight through ffmpeg. Audio targets become
    /// 16 kHz mono WAV, video targets a stream copy into MP4.
    pub async fn capture_playlist(
        &self,
        playlist_url: &str,
        output_dir: &Path,
        stem: &str,
        output_type: OutputType,
    ) -> MediaResult<PathBuf> {
        let (file, args) = match output_type {
            OutputType::Audio => {
                let wav = output_dir.join(format!("{stem}.wav"));
                let args = vec![
                    "-i".to_string(),
                    playlist_url.to_string(),
                    "-c".to_string(),
                    "pcm_s16le".to_string(),
                    "-ar".to_string(),
                    "16000".to_string(),
                    "-ac".to_string(),
                    "1".to_string(),
                    "-y".to_string(),
                    wav.display().to_string(),
                ];
                (wav, args)
            }
            OutputType::Video => {
                let mp4 = output_dir.join(format!("{stem}.mp4"));
                let args = vec![
                    "-i".to_string(),
                    playlist_url.to_string(),
                    "-c".to_string(),
                    "copy".to_string(),
                    "-y".to_string(),
                    mp4.display().to_string(),
                ];
                (mp4, args)
            }
        };
        self.run_ffmpeg(args, &file).await?;
        Ok(file)
    }

    async fn run_ffmpeg(&self, args: Vec<String>, produced: &Path) -> MediaResult<()> {
        let future = timeout(self.convert_timeout, self.executor.run(&self.ffmpeg, &args));
        let output = match future.await {
            Ok(result) => result?,
            Err(_) => return Err(MediaError::Timeout(self.convert_timeout)),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(MediaError::CommandFailure {
                command: format!("{} {}", self.ffmpeg.display(), args.join(" ")),
                status: output.status.code(),
                stderr,
            });
        }
        match tokio::fs::metadata(produced).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(MediaError::MissingOutput {
                path: produced.to_path_buf(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize, Default)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
}
