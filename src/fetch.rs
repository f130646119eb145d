use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; listings-bot/1.0; +https://example.org/bot)";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const BASE_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeouts, connection failures and retryable HTTP statuses.
    #[error("transient fetch failure: {0}")]
    Transient(String),
    /// Any other non-2xx response; retrying will not help.
    #[error("fatal fetch failure: {0}")]
    Fatal(String),
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Seam between the pagination controller and whatever supplies page markup.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, page_url: &str) -> Result<String, FetchError>;
}

/// HTTP fetcher over one pooled client with a fixed identity header set.
pub struct PageFetcher {
    client: reqwest::Client,
    retries: u32,
}

impl PageFetcher {
    /// `retries = 0` surfaces the first transient failure unretried.
    pub fn new(user_agent: &str, retries: u32) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
        );
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| FetchError::Fatal(format!("client setup failed: {err}")))?;
        Ok(Self { client, retries })
    }

    async fn fetch_once(&self, page_url: &str) -> Result<String, FetchError> {
        let response = self.client.get(page_url).send().await.map_err(|err| {
            if err.is_timeout() || err.is_connect() || err.is_request() {
                FetchError::Transient(err.to_string())
            } else {
                FetchError::Fatal(err.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .text()
                .await
                .map_err(|err| FetchError::Transient(err.to_string()));
        }
        if is_transient_status(status) {
            Err(FetchError::Transient(format!("http {status}")))
        } else {
            Err(FetchError::Fatal(format!("http {status}")))
        }
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch(&self, page_url: &str) -> Result<String, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(page_url).await {
                Err(FetchError::Transient(reason)) if attempt < self.retries => {
                    let backoff = BASE_BACKOFF * 2u32.pow(attempt);
                    warn!(
                        "transient failure on {page_url} ({reason}), retrying in {:.1}s (attempt {}/{})",
                        backoff.as_secs_f64(),
                        attempt + 1,
                        self.retries
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
