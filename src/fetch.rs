use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use url::Url;

use crate::config::{CrawlConfig, FetchSettings};
use crate::rate_limit::RateLimiter;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The crawl is stopping; `attempts` requests were made before that.
    #[error("fetch of {url} stopped after {attempts} attempt(s)")]
    Stopped { url: String, attempts: u32 },
    #[error("giving up on {url} after {attempts} attempt(s): {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

/// Retrieves page markup for the orchestrator.
///
/// `Ok(None)` means the URL answered with something that is not HTML (or an
/// empty body); that is not a failure and is never retried.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, limiter: &RateLimiter) -> Result<Option<String>, FetchError>;
}

/// Number of attempts made for a given retry budget. A budget of zero still
/// makes the one initial attempt.
pub fn attempt_budget(max_retries: u32) -> u32 {
    max_retries.max(1)
}

/// Wait inserted after failed attempt number `attempt` (1-based).
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(attempt)
}

pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings, max_retries: u32) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .build()
            .context("build page fetch http client")?;

        Ok(Self {
            client,
            max_retries,
            retry_backoff: settings.retry_backoff,
        })
    }

    pub fn from_config(config: &CrawlConfig) -> anyhow::Result<Self> {
        Self::new(config.fetch(), config.max_retries())
    }

    async fn fetch_once(&self, url: &Url) -> anyhow::Result<Option<String>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status} for {url}");
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        if !content_type.as_deref().is_some_and(is_html_content_type) {
            tracing::debug!(%url, content_type = ?content_type, "skipping non-html content");
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("read body of {url}"))?;
        if body.trim().is_empty() {
            tracing::debug!(%url, "skipping empty body");
            return Ok(None);
        }
        Ok(Some(body))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, limiter: &RateLimiter) -> Result<Option<String>, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;

        let attempts = attempt_budget(self.max_retries);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            if !limiter.acquire().await {
                return Err(FetchError::Stopped {
                    url: url.to_owned(),
                    attempts: attempt - 1,
                });
            }
            match self.fetch_once(&parsed).await {
                Ok(body) => {
                    tracing::debug!(%url, attempt, "fetched");
                    return Ok(body);
                }
                Err(err) => {
                    last_error = format!("{err:#}");
                    tracing::debug!(%url, attempt, attempts, err = %last_error, "fetch attempt failed");
                }
            }

            if attempt < attempts {
                let wait = backoff_delay(attempt, self.retry_backoff);
                tracing::debug!(%url, attempt, wait_ms = wait.as_millis() as u64, "retrying");
                if !limiter.pause(wait).await {
                    return Err(FetchError::Stopped {
                        url: url.to_owned(),
                        attempts: attempt,
                    });
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_owned(),
            attempts,
            last_error,
        })
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    content_type.starts_with("text/html") || content_type.starts_with("application/xhtml+xml")
}
