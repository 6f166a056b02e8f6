pub mod direct;
pub mod stubs;
pub mod youtube;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::VgetConfig;
use crate::job::OutputType;

pub use direct::DirectMediaProvider;
pub use stubs::{
    instagram_provider, tiktok_provider, twitter_provider, vimeo_provider, StubProvider,
};
pub use youtube::YouTubeProvider;

/// Outcome of one acquisition attempt. Failure is a value, not an error:
/// providers contain their own internals and always report one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    Success {
        output_path: PathBuf,
        metadata: HashMap<String, Value>,
    },
    Failure {
        message: String,
    },
}

impl AcquireOutcome {
    pub fn success(output_path: impl Into<PathBuf>, metadata: HashMap<String, Value>) -> Self {
        AcquireOutcome::Success {
            output_path: output_path.into(),
            metadata,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        AcquireOutcome::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AcquireOutcome::Success { .. })
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pure predicate over the URL. No I/O happens here.
    fn matches(&self, url: &str) -> bool;

    async fn acquire(
        &self,
        url: &str,
        output_dir: &Path,
        output_type: OutputType,
        job_id: &str,
    ) -> AcquireOutcome;
}

/// Hostname membership test shared by the domain-based providers. The match
/// is a substring of the host, so `youtu.be` also covers `www.youtu.be`.
pub(crate) fn hostname_matches(url: &str, domains: &[&str]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    domains.iter().any(|domain| host.contains(domain))
}

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Stream an HTTP body to disk and hand back the response headers. The
/// transfer deadline comes from the client's own timeout.
pub(crate) async fn fetch_to_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
) -> Result<reqwest::header::HeaderMap, FetchError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let headers = response.headers().clone();
    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    while let Some(chunk) = stream.next().await {
        let data = chunk?;
        file.write_all(&data)
            .await
            .map_err(|source| FetchError::Io {
                path: path.to_path_buf(),
                source,
            })?;
    }
    file.flush().await.map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(headers)
}

/// Fixed, ordered set of providers. Resolution walks the list and returns
/// the first match, so registration order is the priority order.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// Production lineup in priority order.
    pub fn standard(config: &VgetConfig) -> Self {
        Self::new(vec![
            Arc::new(YouTubeProvider::from_config(config)),
            Arc::new(DirectMediaProvider::from_config(config)),
            Arc::new(tiktok_provider()),
            Arc::new(instagram_provider()),
            Arc::new(twitter_provider()),
            Arc::new(vimeo_provider()),
        ])
    }

    pub fn resolve(&self, url: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .iter()
            .find(|provider| provider.matches(url))
            .cloned()
    }

    pub fn resolve_by_name(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
            .cloned()
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        name: &'static str,
        domains: Vec<&'static str>,
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn matches(&self, url: &str) -> bool {
            hostname_matches(url, &self.domains)
        }

        async fn acquire(
            &self,
            _url: &str,
            _output_dir: &Path,
            _output_type: OutputType,
            _job_id: &str,
        ) -> AcquireOutcome {
            AcquireOutcome::failure("not exercised")
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(vec![
            Arc::new(FixedProvider {
                name: "first",
                domains: vec!["shared.example"],
            }),
            Arc::new(FixedProvider {
                name: "second",
                domains: vec!["shared.example", "only-second.example"],
            }),
        ])
    }

    #[test]
    fn resolve_returns_earlier_registration_on_overlap() {
        let registry = registry();
        let provider = registry
            .resolve("https://shared.example/watch?v=1")
            .expect("provider");
        assert_eq!(provider.name(), "first");
    }

    #[test]
    fn resolve_falls_through_to_later_providers() {
        let registry = registry();
        let provider = registry
            .resolve("https://only-second.example/clip")
            .expect("provider");
        assert_eq!(provider.name(), "second");
    }

    #[test]
    fn resolve_returns_none_for_unknown_host() {
        let registry = registry();
        assert!(registry.resolve("https://video.example/watch?v=abc").is_none());
    }

    #[test]
    fn resolve_by_name_finds_registered_provider() {
        let registry = registry();
        assert!(registry.resolve_by_name("second").is_some());
        assert!(registry.resolve_by_name("absent").is_none());
    }

    #[test]
    fn hostname_match_rejects_unparsable_urls() {
        assert!(!hostname_matches("not a url", &["youtube.com"]));
        assert!(!hostname_matches("file:///tmp/a.mp4", &["youtube.com"]));
    }
}
