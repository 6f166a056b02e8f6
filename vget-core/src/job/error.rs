use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("no provider can handle url: {url}")]
    NoProviderMatched { url: String },
    #[error("job store directory not configured")]
    MissingStore,
}

pub type JobResult<T> = std::result::Result<T, JobError>;
