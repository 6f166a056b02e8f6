pub mod browser;
pub mod config;
pub mod error;
pub mod extractor;
pub mod job;
pub mod media;
pub mod provider;

pub use browser::{BrowserError, BrowserResult, BrowserSession, StreamCapture, StreamCollector};
pub use config::{
    load_vget_config, BrowserSection, CleanupSection, ExtractorSection, MediaSection,
    ServerSection, StorageSection, VgetConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use extractor::{Extractor, ExtractorError, ExtractorResult};
pub use job::{
    FileJobStore, FileJobStoreBuilder, Job, JobEngine, JobError, JobResult, JobStatus, JobUpdate,
    OutputType,
};
pub use media::{CommandExecutor, MediaError, MediaResult, MediaTools, SystemCommandExecutor};
pub use provider::{
    instagram_provider, tiktok_provider, twitter_provider, vimeo_provider, AcquireOutcome,
    DirectMediaProvider, Provider, ProviderRegistry, StubProvider, YouTubeProvider,
};
