use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::info;

use crate::config::{ExtractorSection, VgetConfig};
use crate::media::{CommandExecutor, SystemCommandExecutor};

/// Result alias for extraction tool operations.
pub type ExtractorResult<T> = Result<T, ExtractorError>;

/// Errors produced while invoking the external extraction tool.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("extraction tool failed ({command}): {stderr}")]
    CommandFailure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("extraction tool timed out after {0:?}")]
    Timeout(Duration),
    #[error("extraction tool produced no output for {stem}")]
    MissingOutput { stem: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// yt-dlp front-end. The contract with the tool is purely positional: an
/// output file matching the requested template appears, or it does not.
pub struct Extractor {
    binary: PathBuf,
    cookies_file: Option<PathBuf>,
    player_clients: Vec<String>,
    audio_bitrate: String,
    timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
}

impl Extractor {
    pub fn from_config(config: &VgetConfig) -> Self {
        let cookies = config
            .extractor
            .cookies_file
            .as_ref()
            .map(|path| config.resolve_path(path));
        Self::new(config.extractor.clone(), cookies)
    }

    /// `cookies_file` must already be resolved to an absolute location.
    pub fn new(section: ExtractorSection, cookies_file: Option<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from(&section.binary),
            cookies_file,
            player_clients: section.player_clients,
            audio_bitrate: section.audio_bitrate,
            timeout: Duration::from_secs(section.timeout_seconds),
            executor: Arc::new(SystemCommandExecutor),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Whether a cookies file was configured and is present on disk.
    pub fn cookies_available(&self) -> bool {
        self.cookies_file
            .as_deref()
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    /// Best-available audio, post-processed to MP3.
    pub async fn fetch_audio(
        &self,
        url: &str,
        output_dir: &Path,
        stem: &str,
        use_cookies: bool,
    ) -> ExtractorResult<PathBuf> {
        let mut args = vec![
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "--no-playlist".to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--audio-quality".to_string(),
            self.audio_bitrate.clone(),
        ];
        self.push_common_args(&mut args, output_dir, stem, use_cookies);
        args.push(url.to_string());
        info!(
            url,
            cookies = use_cookies && self.cookies_available(),
            "extracting best audio"
        );
        self.run_tool(args, output_dir, stem, "mp3").await
    }

    /// Best-available video merged into an MP4 container.
    pub async fn fetch_video(
        &self,
        url: &str,
        output_dir: &Path,
        stem: &str,
        use_cookies: bool,
    ) -> ExtractorResult<PathBuf> {
        let mut args = vec![
            "-f".to_string(),
            "bestvideo+bestaudio/best".to_string(),
            "--no-playlist".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
        ];
        self.push_common_args(&mut args, output_dir, stem, use_cookies);
        args.push(url.to_string());
        info!(
            url,
            cookies = use_cookies && self.cookies_available(),
            "extracting best video"
        );
        self.run_tool(args, output_dir, stem, "mp4").await
    }

    fn push_common_args(
        &self,
        args: &mut Vec<String>,
        output_dir: &Path,
        stem: &str,
        use_cookies: bool,
    ) {
        if !self.player_clients.is_empty() {
            args.push("--extractor-args".to_string());
            args.push(format!(
                "youtube:player_client={}",
                self.player_clients.join(",")
            ));
        }
        args.push("-o".to_string());
        args.push(format!("{}/{stem}.%(ext)s", output_dir.display()));
        if use_cookies {
            if let Some(cookies) = self.cookies_file.as_deref().filter(|path| path.exists()) {
                args.push("--cookies".to_string());
                args.push(cookies.display().to_string());
            }
        }
    }

    async fn run_tool(
        &self,
        args: Vec<String>,
        output_dir: &Path,
        stem: &str,
        expected_ext: &str,
    ) -> ExtractorResult<PathBuf> {
        let future = timeout(self.timeout, self.executor.run(&self.binary, &args));
        let output = match future.await {
            Ok(result) => result?,
            Err(_) => return Err(ExtractorError::Timeout(self.timeout)),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(ExtractorError::CommandFailure {
                command: format!("{} {}", self.binary.display(), args.join(" ")),
                status: output.status.code(),
                stderr,
            });
        }
        self.discover_output(output_dir, stem, expected_ext).await
    }

    async fn discover_output(
        &self,
        output_dir: &Path,
        stem: &str,
        expected_ext: &str,
    ) -> ExtractorResult<PathBuf> {
        let expected = output_dir.join(format!("{stem}.{expected_ext}"));
        if tokio::fs::metadata(&expected).await.is_ok() {
            return Ok(expected);
        }
        // the tool keeps the source container when post-processing is skipped
        let prefix = format!("{stem}.");
        let mut entries = tokio::fs::read_dir(output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && !name.ends_with(".part") {
                return Ok(entry.path());
            }
        }
        Err(ExtractorError::MissingOutput {
            stem: stem.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[cfg(unix)]
    use std::os::unix::process::ExitStatusExt;
    #[cfg(windows)]
    use std::os::windows::process::ExitStatusExt;

    type RecordedCalls = Arc<Mutex<Vec<(PathBuf, Vec<String>)>>>;

    struct MockExecutor {
        calls: RecordedCalls,
        status: std::process::ExitStatus,
        stderr: Vec<u8>,
    }

    impl MockExecutor {
        fn succeeding() -> (Arc<dyn CommandExecutor>, RecordedCalls) {
            Self::build(exit_status(0), Vec::new())
        }

        fn failing(stderr: &str) -> (Arc<dyn CommandExecutor>, RecordedCalls) {
            Self::build(exit_status(1), stderr.as_bytes().to_vec())
        }

        fn build(
            status: std::process::ExitStatus,
            stderr: Vec<u8>,
        ) -> (Arc<dyn CommandExecutor>, RecordedCalls) {
            let calls: RecordedCalls = Arc::new(Mutex::new(Vec::new()));
            let executor: Arc<dyn CommandExecutor> = Arc::new(Self {
                calls: Arc::clone(&calls),
                status,
                stderr,
            });
            (executor, calls)
        }
    }

    #[async_trait]
    impl CommandExecutor for MockExecutor {
        async fn run(
            &self,
            program: &Path,
            args: &[String],
        ) -> std::io::Result<std::process::Output> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_path_buf(), args.to_vec()));
            Ok(std::process::Output {
                status: self.status,
                stdout: Vec::new(),
                stderr: self.stderr.clone(),
            })
        }
    }

    fn exit_status(code: i32) -> std::process::ExitStatus {
        #[cfg(unix)]
        {
            std::process::ExitStatus::from_raw(code << 8)
        }
        #[cfg(windows)]
        {
            std::process::ExitStatus::from_raw(code as u32)
        }
    }

    fn section() -> ExtractorSection {
        ExtractorSection {
            binary: "yt-dlp".into(),
            cookies_file: None,
            player_clients: vec![
                "mweb".into(),
                "ios".into(),
                "android".into(),
                "web".into(),
            ],
            audio_bitrate: "192".into(),
            timeout_seconds: 60,
        }
    }

    #[tokio::test]
    async fn audio_request_builds_expected_args() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("job-1.mp3"), b"id3").unwrap();
        let (executor, calls) = MockExecutor::succeeding();
        let extractor = Extractor::new(section(), None).with_executor(executor);

        let out = extractor
            .fetch_audio("https://youtu.be/abc", dir.path(), "job-1", false)
            .await
            .unwrap();
        assert_eq!(out, dir.path().join("job-1.mp3"));

        let recorded = calls.lock().unwrap();
        assert_eq!(recorded[0].0, PathBuf::from("yt-dlp"));
        let args = &recorded[0].1;
        assert!(args.windows(2).any(|w| w == ["-f", "bestaudio/best"]));
        assert!(args.contains(&String::from("--no-playlist")));
        assert!(args.windows(2).any(|w| w == ["--audio-format", "mp3"]));
        assert!(args.windows(2).any(|w| w == ["--audio-quality", "192"]));
        assert!(args.contains(&String::from(
            "youtube:player_client=mweb,ios,android,web"
        )));
        assert!(!args.contains(&String::from("--cookies")));
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn video_request_merges_into_mp4() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("job-2.mp4"), b"ftyp").unwrap();
        let (executor, calls) = MockExecutor::succeeding();
        let extractor = Extractor::new(section(), None).with_executor(executor);

        let out = extractor
            .fetch_video("https://youtu.be/abc", dir.path(), "job-2", false)
            .await
            .unwrap();
        assert_eq!(out, dir.path().join("job-2.mp4"));

        let recorded = calls.lock().unwrap();
        let args = &recorded[0].1;
        assert!(args
            .windows(2)
            .any(|w| w == ["-f", "bestvideo+bestaudio/best"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["--merge-output-format", "mp4"]));
    }

    #[tokio::test]
    async fn cookies_are_passed_when_present() {
        let dir = tempdir().unwrap();
        let cookies = dir.path().join("cookies.txt");
        std::fs::write(&cookies, b"# Netscape HTTP Cookie File").unwrap();
        std::fs::write(dir.path().join("job-3.mp3"), b"id3").unwrap();
        let (executor, calls) = MockExecutor::succeeding();
        let extractor =
            Extractor::new(section(), Some(cookies.clone())).with_executor(executor);

        assert!(extractor.cookies_available());
        extractor
            .fetch_audio("https://youtu.be/abc", dir.path(), "job-3", true)
            .await
            .unwrap();

        let recorded = calls.lock().unwrap();
        let args = &recorded[0].1;
        assert!(args
            .windows(2)
            .any(|w| w == ["--cookies".to_string(), cookies.display().to_string()]));
    }

    #[tokio::test]
    async fn missing_cookies_file_is_silently_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("job-4.mp3"), b"id3").unwrap();
        let (executor, calls) = MockExecutor::succeeding();
        let extractor = Extractor::new(section(), Some(PathBuf::from("/nonexistent/cookies.txt")))
            .with_executor(executor);

        assert!(!extractor.cookies_available());
        extractor
            .fetch_audio("https://youtu.be/abc", dir.path(), "job-4", true)
            .await
            .unwrap();

        let recorded = calls.lock().unwrap();
        assert!(!recorded[0].1.contains(&String::from("--cookies")));
    }

    #[tokio::test]
    async fn discovery_falls_back_to_sibling_extension() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("job-5.m4a"), b"m4a").unwrap();
        std::fs::write(dir.path().join("job-5.m4a.part"), b"partial").unwrap();
        let (executor, _calls) = MockExecutor::succeeding();
        let extractor = Extractor::new(section(), None).with_executor(executor);

        let out = extractor
            .fetch_audio("https://youtu.be/abc", dir.path(), "job-5", false)
            .await
            .unwrap();
        assert_eq!(out, dir.path().join("job-5.m4a"));
    }

    #[tokio::test]
    async fn absent_output_is_reported() {
        let dir = tempdir().unwrap();
        let (executor, _calls) = MockExecutor::succeeding();
        let extractor = Extractor::new(section(), None).with_executor(executor);

        let err = extractor
            .fetch_audio("https://youtu.be/abc", dir.path(), "job-6", false)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractorError::MissingOutput { .. }));
    }

    #[tokio::test]
    async fn tool_failure_preserves_stderr() {
        let dir = tempdir().unwrap();
        let (executor, _calls) = MockExecutor::failing("Sign in to confirm you're not a bot");
        let extractor = Extractor::new(section(), None).with_executor(executor);

        let err = extractor
            .fetch_audio("https://youtu.be/abc", dir.path(), "job-7", false)
            .await
            .unwrap_err();
        match err {
            ExtractorError::CommandFailure { stderr, status, .. } => {
                assert_eq!(status, Some(1));
                assert!(stderr.contains("not a bot"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
