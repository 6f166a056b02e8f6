use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::job::OutputType;

use super::{hostname_matches, AcquireOutcome, Provider};

/// Declared platform without an implementation yet. Matching one of these is
/// a distinct, reportable condition from no provider matching at all, so the
/// stub still claims its domains and fails fast with upload guidance.
#[derive(Debug, Clone)]
pub struct StubProvider {
    name: &'static str,
    platform: &'static str,
    domains: &'static [&'static str],
}

impl StubProvider {
    pub fn new(
        name: &'static str,
        platform: &'static str,
        domains: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            platform,
            domains,
        }
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn matches(&self, url: &str) -> bool {
        hostname_matches(url, self.domains)
    }

    async fn acquire(
        &self,
        url: &str,
        _output_dir: &Path,
        _output_type: OutputType,
        job_id: &str,
    ) -> AcquireOutcome {
        debug!(provider = self.name, job_id = %job_id, url = %url, "stub provider declined");
        AcquireOutcome::failure(format!(
            "{} provider is not yet implemented. Please use the 'Upload File' option instead.",
            self.platform
        ))
    }
}

pub fn tiktok_provider() -> StubProvider {
    StubProvider::new(
        "tiktok",
        "TikTok",
        &["tiktok.com", "www.tiktok.com", "vm.tiktok.com"],
    )
}

pub fn instagram_provider() -> StubProvider {
    StubProvider::new(
        "instagram",
        "Instagram",
        &["instagram.com", "www.instagram.com"],
    )
}

pub fn twitter_provider() -> StubProvider {
    StubProvider::new(
        "twitter",
        "Twitter/X",
        &["twitter.com", "www.twitter.com", "x.com", "www.x.com"],
    )
}

pub fn vimeo_provider() -> StubProvider {
    StubProvider::new("vimeo", "Vimeo", &["vimeo.com", "www.vimeo.com"])
}
