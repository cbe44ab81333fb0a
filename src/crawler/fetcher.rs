//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests against the forum, including:
//! - Building the cookie-carrying client with browser-like headers
//! - GET requests with bounded retry and exponential backoff
//! - Form POSTs for the login handshake
//! - Error classification into [`FetchError`]

use crate::config::CrawlerConfig;
use crate::FetchError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::{redirect::Policy, Client, RequestBuilder};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// A page as served by the forum
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Decoded body
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Builds an HTTP client with proper configuration
///
/// The client keeps cookies between requests so a logged-in session
/// carries across the whole run.
///
/// # Example
///
/// ```no_run
/// use forum_harvest::config::CrawlerConfig;
/// use forum_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("pl,en-US;q=0.7,en;q=0.3"),
    );

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(config.request_timeout())
        .connect_timeout(config.request_timeout())
        .redirect(Policy::limited(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Session-carrying client for one forum
///
/// Every request goes through the same cookie store. GETs are retried on
/// transient failures; each retry is logged.
#[derive(Debug, Clone)]
pub struct ForumClient {
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ForumClient {
    /// Creates a client from the crawler configuration
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?, config))
    }

    /// Wraps an already-built reqwest client
    pub fn with_client(client: Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Fetches a page, failing on any non-success status
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Timeout, connect failure | Retry |
    /// | HTTP 408, 429, 5xx | Retry |
    /// | Other HTTP errors | Fail immediately |
    /// | Body decode failure | Fail immediately |
    ///
    /// The delay starts at `retry_backoff_ms` and doubles per attempt.
    pub async fn get(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.get_cancellable(url, &CancellationToken::new()).await
    }

    /// Same as [`ForumClient::get`], but gives up waiting for a retry once
    /// `cancel` fires and returns the last error
    pub async fn get_cancellable(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            let result = self
                .send_once(url, self.client.get(url.as_str()))
                .await
                .and_then(require_success);

            match result {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    attempt += 1;
                    warn!(
                        url = %url,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(url = %url, "Retry abandoned on cancellation");
                            return Err(e);
                        }
                        _ = sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetches a page once and returns it whatever its status
    pub async fn get_any_status(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.send_once(url, self.client.get(url.as_str())).await
    }

    /// Submits a url-encoded form once and returns the response whatever its status
    pub async fn post_form(
        &self,
        url: &Url,
        form: &[(String, String)],
        referer: &Url,
    ) -> Result<FetchedPage, FetchError> {
        let request = self
            .client
            .post(url.as_str())
            .header(REFERER, referer.as_str())
            .form(form);
        self.send_once(url, request).await
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }

    async fn send_once(&self, url: &Url, request: RequestBuilder) -> Result<FetchedPage, FetchError> {
        debug!(url = %url, "Sending request");

        let response = request.send().await.map_err(|e| classify(url, e))?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let body = response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!(url = %final_url, status, bytes = body.len(), "Received response");

        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}

pub(crate) fn require_success(page: FetchedPage) -> Result<FetchedPage, FetchError> {
    if page.is_success() {
        Ok(page)
    } else {
        Err(FetchError::Status {
            url: page.url.to_string(),
            status: page.status,
        })
    }
}

fn classify(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
