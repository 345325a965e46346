//! Resource Search
//!
//! Finds web and video resources for a topic. The scheduler only needs to tell a
//! rate limit apart from every other failure, so implementations map throttling to
//! [`ApiError::RateLimited`] and everything else to [`ApiError::Upstream`].

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::ApiError;
use crate::tree::SearchResult;

#[async_trait]
pub trait ResourceSearch: Send + Sync {
    async fn search(&self, term: &str) -> Result<SearchResult, ApiError>;
}

const SEARCH_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn map_http_error(error: reqwest::Error) -> ApiError {
    match error.status().map(|s| s.as_u16()) {
        Some(429) => ApiError::RateLimited(format!("search throttled: {error}")),
        Some(status) => ApiError::Upstream(format!("search failed with status {status}: {error}")),
        None if error.is_timeout() => ApiError::Upstream(format!("search timeout: {error}")),
        None if error.is_connect() => ApiError::Upstream(format!("search connection error: {error}")),
        None => ApiError::Upstream(format!("search HTTP error: {error}")),
    }
}

/// JSON search backend reached over HTTP.
///
/// `GET {endpoint}?q={term}&num={results_per_kind}` must answer with
/// `{"webResults": [...], "videoResults": [...]}` (singular keys are accepted too).
pub struct HttpResourceSearch {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    results_per_kind: usize,
    fallback_suffix: String,
}

impl HttpResourceSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(SEARCH_HTTP_CONNECT_TIMEOUT)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create search client: {e}")))?;
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| ApiError::ConfigError("search.endpoint is not set".to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            results_per_kind: config.results_per_kind,
            fallback_suffix: config.fallback_suffix.clone(),
        })
    }

    async fn fetch(&self, term: &str) -> Result<SearchResult, ApiError> {
        let num = self.results_per_kind.to_string();
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", term), ("num", num.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let response = request.send().await.map_err(map_http_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status.as_u16() {
                429 => ApiError::RateLimited(format!("search throttled: {body}")),
                code => ApiError::Upstream(format!("search failed with status {code}: {body}")),
            });
        }

        let mut result: SearchResult = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Failed to parse search response: {e}")))?;
        result.web_results.truncate(self.results_per_kind);
        result.video_results.truncate(self.results_per_kind);
        Ok(result)
    }
}

/// Term used for the single retry when the first search found no web pages.
pub fn fallback_term(term: &str, suffix: &str) -> String {
    if suffix.trim().is_empty() {
        return term.to_string();
    }
    format!("{} {}", term.trim_end(), suffix.trim())
}

#[async_trait]
impl ResourceSearch for HttpResourceSearch {
    async fn search(&self, term: &str) -> Result<SearchResult, ApiError> {
        let result = self.fetch(term).await?;
        if !result.web_results.is_empty() || self.fallback_suffix.trim().is_empty() {
            return Ok(result);
        }
        let retry = fallback_term(term, &self.fallback_suffix);
        debug!(term, retry = %retry, "No web results, retrying with fallback term");
        let fallback = self.fetch(&retry).await?;
        // Keep whatever videos the first attempt found if the retry has none.
        if fallback.web_results.is_empty() && fallback.video_results.is_empty() {
            return Ok(result);
        }
        Ok(fallback)
    }
}
