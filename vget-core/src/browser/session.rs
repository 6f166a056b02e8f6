use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserSection;

use super::error::{BrowserError, BrowserResult};

/// One headless Chromium instance with a throwaway profile directory.
/// Pages handed out by [`new_page`](Self::new_page) carry the network hook
/// that records every fetch/XHR URL the player issues.
pub struct BrowserSession {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    user_agent: String,
    _profile_dir: TempDir,
}

impl BrowserSession {
    pub async fn launch(config: &BrowserSection) -> BrowserResult<Self> {
        let profile_dir = tempfile::tempdir()?;

        let mut builder = ChromiumConfig::builder()
            .chrome_executable(&config.executable_path)
            .user_data_dir(profile_dir.path())
            .request_timeout(Duration::from_secs(config.navigation_timeout_seconds));
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        builder = builder.args(vec![
            format!("--user-agent={}", config.user_agent),
            "--mute-audio".to_string(),
            "--autoplay-policy=no-user-gesture-required".to_string(),
            "--no-first-run".to_string(),
            "--disable-features=AutomationControlled".to_string(),
            "--disable-background-timer-throttling".to_string(),
            "--password-store=basic".to_string(),
        ]);
        let chromium_config = builder.build().map_err(BrowserError::Configuration)?;

        info!(
            executable = %config.executable_path,
            headless = config.headless,
            "launching chromium instance"
        );
        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });

        Ok(Self {
            browser,
            handler_task: Some(handler_task),
            user_agent: config.user_agent.clone(),
            _profile_dir: profile_dir,
        })
    }

    /// Open a fresh tab with stealth overrides and the request-recording
    /// hook installed before any document runs.
    pub async fn new_page(&self) -> BrowserResult<Page> {
        let params = CreateTargetParams::new("about:blank");
        let page = self.browser.new_page(params).await?;

        page.enable_stealth_mode_with_agent(&self.user_agent)
            .await?;
        let override_params = SetUserAgentOverrideParams::builder()
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(BrowserError::Configuration)?;
        page.set_user_agent(override_params).await?;

        page.evaluate_on_new_document(
            AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(NETWORK_HOOK)
                .build()
                .map_err(BrowserError::Configuration)?,
        )
        .await?;
        Ok(page)
    }

    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!("shutting down chromium instance");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "browser handler join error");
            }
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!("browser session dropped without explicit shutdown");
            }
        }
    }
}

const NETWORK_HOOK: &str = r#"
(() => {
    const bucket = [];
    const push = (entry) => {
        try {
            bucket.push(entry);
        } catch (_) {
            // ignore
        }
    };
    Object.defineProperty(window, '__vgetCapturedRequests', {
        value: bucket,
        writable: false,
        configurable: false,
    });

    const originalFetch = window.fetch;
    window.fetch = async (...args) => {
        const response = await originalFetch(...args);
        try {
            const request = args[0];
            const url = typeof request === 'string' ? request : request.url;
            push({ url: String(url || ''), type: 'fetch', status: response.status });
        } catch (_) {}
        return response;
    };

    const OriginalXHR = window.XMLHttpRequest;
    window.XMLHttpRequest = function() {
        const xhr = new OriginalXHR();
        let url = '';
        let method = 'GET';
        const open = xhr.open;
        xhr.open = function(m, u) {
            method = m || 'GET';
            url = u || '';
            return open.apply(xhr, arguments);
        };
        xhr.addEventListener('loadend', function() {
            push({ url: String(url || ''), type: 'xhr', status: xhr.status, method });
        });
        return xhr;
    };
})();
"#;
