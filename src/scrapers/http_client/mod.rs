//! Static HTTP backend.
//!
//! One [`HttpClient`] per site task. It owns its connection pool and cookie
//! jar, issues GET requests only, follows redirects, and applies the
//! [`RetryPolicy`] to every URL.

mod retry;
mod user_agent;

pub use retry::{
    classify, parse_retry_after, run_with_retries, RetryPolicy, MAX_BACKOFF, MAX_RETRY_AFTER,
};
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, RETRY_AFTER};
use reqwest::{redirect, Client};
use tracing::debug;
use url::Url;

use super::{build_url, Document, Fetcher};
use crate::config::Settings;
use crate::error::{HarvestError, Result};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";
const MAX_REDIRECTS: usize = 10;

/// HTTP fetcher with retry handling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    policy: RetryPolicy,
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    policy: RetryPolicy,
}

impl HttpClientBuilder {
    /// Set the user agent string. Without it the descriptive default is sent.
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let user_agent = resolve_user_agent(self.user_agent.as_deref());

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ko-KR,ko;q=0.9,en;q=0.5"));

        let client = Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .timeout(self.timeout)
            .gzip(true)
            .deflate(true)
            .cookie_store(true)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| HarvestError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(HttpClient {
            client,
            policy: self.policy,
        })
    }
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder {
            timeout: Duration::from_secs(10),
            user_agent: None,
            policy: RetryPolicy::default(),
        }
    }

    /// Client configured from run settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut builder = Self::builder()
            .timeout(settings.timeout)
            .retry_policy(RetryPolicy::with_attempts(settings.max_retries));
        if let Some(ua) = settings.user_agent.as_deref() {
            builder = builder.user_agent(ua);
        }
        builder.build()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn get_once(&self, url: &Url, attempt: u32) -> Result<Document> {
        debug!("GET {} (attempt {})", url, attempt);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        classify(status, retry_after, url.as_str())?;

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| transport_error(url, e))?;
        debug!("{} -> {} ({} bytes)", url, status, body.len());

        Ok(Document::new(final_url, body))
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> HarvestError {
    let reason = if err.is_timeout() {
        "timeout".to_string()
    } else if err.is_connect() {
        format!("connection error: {}", err)
    } else {
        err.to_string()
    };
    HarvestError::Transient {
        url: url.to_string(),
        reason,
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&mut self, url: &str, params: &[(String, String)]) -> Result<Document> {
        let target = build_url(url, params)?;
        let this = &*self;
        run_with_retries(&this.policy, target.as_str(), |attempt| {
            this.get_once(&target, attempt)
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "http"
    }
}
