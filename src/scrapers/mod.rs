//! Page retrieval for board harvesting.
//!
//! A [`Fetcher`] turns a URL plus query parameters into a [`Document`].
//! Each site task owns exactly one fetcher, so requests from one worker are
//! serialised by `&mut self` and concurrency comes from running many
//! workers side by side.

pub mod browser;
pub mod http_client;
mod pacer;

use async_trait::async_trait;
use scraper::Html;
use url::Url;

use crate::error::{HarvestError, Result};

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use http_client::{HttpClient, HttpClientBuilder, RetryPolicy};
pub use pacer::Pacer;

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
}

impl Document {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    /// Parse the body. `Html` is not `Send`; keep it out of await points.
    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Retrieval backend contract.
#[async_trait]
pub trait Fetcher: Send {
    /// GET `url` with `params` appended to its query string.
    async fn fetch(&mut self, url: &str, params: &[(String, String)]) -> Result<Document>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    async fn fetch(&mut self, url: &str, params: &[(String, String)]) -> Result<Document> {
        (**self).fetch(url, params).await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

/// Append query parameters to a URL, keeping any it already has.
pub fn build_url(url: &str, params: &[(String, String)]) -> Result<Url> {
    let mut parsed = Url::parse(url)
        .map_err(|e| HarvestError::InvalidConfig(format!("invalid URL '{}': {}", url, e)))?;
    if !params.is_empty() {
        let mut pairs = parsed.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_appends_params() {
        let url = build_url(
            "https://council.example.go.kr/list.do?menu=7",
            &[
                ("pageIndex".to_string(), "2".to_string()),
                ("searchWrd".to_string(), "본회의".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(url.path(), "/list.do");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("menu".to_string(), "7".to_string()));
        assert_eq!(pairs[1], ("pageIndex".to_string(), "2".to_string()));
        assert_eq!(pairs[2].1, "본회의");
    }

    #[test]
    fn test_build_url_rejects_garbage() {
        let err = build_url("not a url", &[]).unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }
}
