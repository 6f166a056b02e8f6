use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
    #[error("invalid config {}: {message}", path.display())]
    Invalid { message: String, path: PathBuf },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
