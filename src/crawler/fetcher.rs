//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - The `Fetcher` seam the batch scheduler fetches through
//! - Building the HTTP client from the fetch configuration
//! - Block page detection
//! - Error classification

use crate::config::FetchConfig;
use crate::extract::Page;
use crate::input::CrawlTarget;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Per-item fetch failures
///
/// Every variant is retryable: the scheduler turns it into a `Failed`
/// transition and never lets it escape.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("Blocked: {reason}")]
    Blocked { reason: String },

    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),
}

/// Capability to fetch the page behind a crawl target
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target: &CrawlTarget) -> Result<Page, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use harvest::config::FetchConfig;
/// use harvest::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by `reqwest`
pub struct HttpFetcher {
    client: Client,
    blocked_statuses: Vec<u16>,
    block_phrases: Vec<String>,
}

impl HttpFetcher {
    /// Creates a fetcher from the fetch configuration
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            blocked_statuses: config.blocked_statuses.clone(),
            block_phrases: config
                .block_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        })
    }

    /// Returns the matching phrase if `body` looks like a block page
    fn block_phrase(&self, body: &str) -> Option<&str> {
        if self.block_phrases.is_empty() {
            return None;
        }
        let lower = body.to_lowercase();
        self.block_phrases
            .iter()
            .find(|phrase| lower.contains(phrase.as_str()))
            .map(String::as_str)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Fetches a target URL
    ///
    /// # Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Unparseable URL | `InvalidUrl` |
    /// | Status in blocked list | `Blocked` |
    /// | Other non-2xx status | `Http` |
    /// | Body contains a block phrase | `Blocked` |
    /// | Client timeout | `Timeout` |
    /// | Connection or body error | `Network` |
    async fn fetch(&self, target: &CrawlTarget) -> Result<Page, FetchError> {
        let url = url::Url::parse(target.url.trim())
            .map_err(|_| FetchError::InvalidUrl(target.url.clone()))?;

        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        let final_url = response.url().to_string();

        if self.blocked_statuses.contains(&status.as_u16()) {
            return Err(FetchError::Blocked {
                reason: format!("status {}", status),
            });
        }

        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(classify)?;

        if let Some(phrase) = self.block_phrase(&body) {
            return Err(FetchError::Blocked {
                reason: format!("page contains '{}'", phrase),
            });
        }

        Ok(Page {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_builder() {
        FetchError::InvalidUrl(e.url().map(|u| u.to_string()).unwrap_or_default())
    } else {
        FetchError::Network(e.to_string())
    }
}
