//! Headless browser backend for boards rendered by JavaScript.
//!
//! Navigates with chromiumoxide (CDP), waits for the document to become
//! ready plus a fixed settle delay, and returns the DOM snapshot. Same
//! contract and retry policy as the static backend.

mod config;

pub use config::{BrowserEngineConfig, DEFAULT_SETTLE_DELAY};

use std::path::PathBuf;

use crate::error::{HarvestError, Result};

/// Executable names searched for in `PATH`.
const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Well-known install locations checked after `PATH`.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

/// Locate a Chrome/Chromium executable.
pub fn find_chrome(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(HarvestError::Browser(format!(
            "configured browser {} does not exist",
            path.display()
        )));
    }
    for cmd in CHROME_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            return Ok(path);
        }
    }
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }
    Err(HarvestError::Browser(
        "Chrome/Chromium not found; install it or set HARVEST_CHROME".into(),
    ))
}

#[cfg(feature = "browser")]
pub use enabled::BrowserFetcher;

#[cfg(feature = "browser")]
mod enabled {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
    use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
    use chromiumoxide::{Browser, BrowserConfig, Page};
    use futures::StreamExt;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use super::{find_chrome, BrowserEngineConfig};
    use crate::error::{HarvestError, Result};
    use crate::scrapers::http_client::{resolve_user_agent, run_with_retries, RetryPolicy};
    use crate::scrapers::{build_url, Document, Fetcher};

    const WAIT_FOR_READY_SCRIPT: &str = r#"
        new Promise((resolve) => {
            if (document.readyState === 'complete') {
                resolve(document.readyState);
            } else {
                window.addEventListener('load', () => resolve(document.readyState));
                setTimeout(() => resolve('timeout'), 10000);
            }
        })
    "#;

    /// Browser fetcher owned by one site task. The browser is launched
    /// lazily on first fetch.
    pub struct BrowserFetcher {
        config: BrowserEngineConfig,
        policy: RetryPolicy,
        browser: Option<Arc<Mutex<Browser>>>,
        handler: Option<JoinHandle<()>>,
    }

    impl BrowserFetcher {
        pub fn new(config: BrowserEngineConfig, policy: RetryPolicy) -> Self {
            Self {
                config,
                policy,
                browser: None,
                handler: None,
            }
        }

        async fn ensure_browser(&mut self) -> Result<()> {
            if self.browser.is_some() {
                return Ok(());
            }
            let chrome = find_chrome(self.config.executable.as_ref())?;
            info!("Launching browser {} (headless={})", chrome.display(), self.config.headless);

            let mut builder = BrowserConfig::builder()
                .chrome_executable(chrome)
                .request_timeout(self.config.timeout);
            if !self.config.headless {
                builder = builder.with_head();
            }
            builder = builder
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--no-sandbox")
                .arg("--disable-gpu");
            for arg in &self.config.chrome_args {
                builder = builder.arg(arg);
            }
            let config = builder
                .build()
                .map_err(|e| HarvestError::Browser(format!("browser config: {}", e)))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| HarvestError::Browser(format!("launch failed: {}", e)))?;

            self.handler = Some(tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            }));
            self.browser = Some(Arc::new(Mutex::new(browser)));
            Ok(())
        }

        async fn render(&self, url: &str) -> Result<Document> {
            let page = {
                let browser = self
                    .browser
                    .as_ref()
                    .ok_or_else(|| HarvestError::Browser("browser not running".into()))?
                    .lock()
                    .await;
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| HarvestError::Browser(e.to_string()))?
            };

            let result = self.render_on(&page, url).await;
            if let Err(e) = page.close().await {
                debug!("Closing page failed: {}", e);
            }
            result
        }

        async fn render_on(&self, page: &Page, url: &str) -> Result<Document> {
            let ua = resolve_user_agent(self.config.user_agent.as_deref());
            page.execute(SetUserAgentOverrideParams::new(ua))
                .await
                .map_err(|e| HarvestError::Browser(e.to_string()))?;

            let nav = NavigateParams::builder()
                .url(url)
                .build()
                .map_err(|e| HarvestError::Browser(format!("invalid URL {}: {}", url, e)))?;

            tokio::time::timeout(self.config.timeout, page.execute(nav))
                .await
                .map_err(|_| HarvestError::Transient {
                    url: url.to_string(),
                    reason: "navigation timeout".into(),
                })?
                .map_err(|e| HarvestError::Transient {
                    url: url.to_string(),
                    reason: format!("navigation failed: {}", e),
                })?;

            match tokio::time::timeout(
                self.config.timeout,
                page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()),
            )
            .await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!("Ready-state check failed for {}: {}", url, e),
                Err(_) => warn!("Timeout waiting for {} to load", url),
            }
            tokio::time::sleep(self.config.settle_delay).await;

            let final_url = page
                .url()
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| url.to_string());
            let content = page.content().await.map_err(|e| HarvestError::Transient {
                url: url.to_string(),
                reason: format!("snapshot failed: {}", e),
            })?;

            Ok(Document::new(final_url, content))
        }

        pub async fn close(&mut self) {
            if let Some(browser) = self.browser.take() {
                if let Err(e) = browser.lock().await.close().await {
                    debug!("Browser close failed: {}", e);
                }
            }
            if let Some(handle) = self.handler.take() {
                handle.abort();
            }
        }
    }

    impl Drop for BrowserFetcher {
        fn drop(&mut self) {
            if let Some(handle) = self.handler.take() {
                handle.abort();
            }
        }
    }

    #[async_trait]
    impl Fetcher for BrowserFetcher {
        async fn fetch(&mut self, url: &str, params: &[(String, String)]) -> Result<Document> {
            let target = build_url(url, params)?;
            self.ensure_browser().await?;
            let this = &*self;
            let policy = this.policy;
            run_with_retries(&policy, target.as_str(), |attempt| {
                debug!("Rendering {} (attempt {})", target, attempt);
                this.render(target.as_str())
            })
            .await
        }

        fn backend(&self) -> &'static str {
            "browser"
        }
    }
}
