use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VgetConfig {
    pub storage: StorageSection,
    pub browser: BrowserSection,
    pub extractor: ExtractorSection,
    pub media: MediaSection,
    pub server: ServerSection,
    pub cleanup: CleanupSection,
}

impl VgetConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.storage.base_dir).join(path)
        }
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.resolve_path(&self.storage.jobs_dir)
    }

    pub fn media_dir(&self) -> PathBuf {
        self.resolve_path(&self.storage.media_dir)
    }

    fn validate(&self) -> Result<(), String> {
        if self.server.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "server.bind_addr is not a socket address: {}",
                self.server.bind_addr
            ));
        }
        let [low, high] = self.browser.capture_jitter_ms;
        if low > high {
            return Err(format!(
                "browser.capture_jitter_ms lower bound {low} exceeds upper bound {high}"
            ));
        }
        if self.cleanup.enabled && self.cleanup.interval_seconds == 0 {
            return Err("cleanup.interval_seconds must be nonzero when cleanup is enabled".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    pub base_dir: String,
    pub jobs_dir: String,
    pub media_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    pub executable_path: String,
    pub headless: bool,
    pub sandbox: bool,
    pub user_agent: String,
    pub navigation_timeout_seconds: u64,
    pub capture_wait_seconds: u64,
    pub capture_jitter_ms: [u64; 2],
    pub download_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorSection {
    pub binary: String,
    pub cookies_file: Option<String>,
    pub player_clients: Vec<String>,
    pub audio_bitrate: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSection {
    pub ffmpeg_binary: String,
    pub ffprobe_binary: String,
    pub convert_timeout_seconds: u64,
    pub probe_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupSection {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub max_age_seconds: u64,
}

pub fn load_vget_config<P: AsRef<Path>>(path: P) -> ConfigResult<VgetConfig> {
    let path = path.as_ref();
    let config: VgetConfig = load_toml(path)?;
    config.validate().map_err(|message| ConfigError::Invalid {
        message,
        path: path.to_path_buf(),
    })?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> ConfigResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/vget.toml");
        let config = load_vget_config(path).expect("config should parse");
        assert_eq!(config.storage.jobs_dir, "jobs");
        assert!(config.extractor.player_clients.len() >= 2);
        assert!(config.browser.navigation_timeout_seconds > 0);
        assert!(config.cleanup.enabled);
    }

    #[test]
    fn resolve_path_joins_relative_onto_base() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/vget.toml");
        let config = load_vget_config(path).expect("config should parse");
        let jobs = config.jobs_dir();
        assert!(jobs.ends_with("storage/jobs"));
        let absolute = config.resolve_path("/var/lib/vget/media");
        assert_eq!(absolute, PathBuf::from("/var/lib/vget/media"));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = load_vget_config("/nonexistent/vget.toml").unwrap_err();
        match err {
            ConfigError::Io { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/vget.toml"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn inverted_jitter_bounds_are_rejected() {
        let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/vget.toml");
        let content = std::fs::read_to_string(fixture).expect("fixture should be readable");
        let broken = content.replace(
            "capture_jitter_ms = [250, 1500]",
            "capture_jitter_ms = [1500, 250]",
        );
        assert_ne!(broken, content, "fixture jitter line moved");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vget.toml");
        std::fs::write(&path, broken).expect("write config");

        let err = load_vget_config(&path).unwrap_err();
        match err {
            ConfigError::Invalid { message, .. } => {
                assert!(message.contains("capture_jitter_ms"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
