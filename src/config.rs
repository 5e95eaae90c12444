use std::time::Duration;

use anyhow::Context as _;
use url::Url;

pub const DEFAULT_MAX_PAGES: usize = 100;
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; sitescout/0.1)";

/// Order in which pending URLs leave the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TraversalPolicy {
    /// Earliest-discovered URL first.
    #[default]
    #[value(name = "bfs", alias = "breadth-first")]
    BreadthFirst,
    /// Most recently discovered URL first.
    #[value(name = "dfs", alias = "depth-first")]
    DepthFirst,
}

impl std::fmt::Display for TraversalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BreadthFirst => f.write_str("breadth-first"),
            Self::DepthFirst => f.write_str("depth-first"),
        }
    }
}

/// HTTP client knobs used by [`crate::fetch::HttpFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Wait after failed attempt `n` is `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            retry_backoff: Duration::from_millis(1000),
        }
    }
}

/// Settings for one crawl. Built once through [`CrawlConfigBuilder`] and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    seed_url: Url,
    keywords: Vec<String>,
    max_pages: usize,
    policy: TraversalPolicy,
    request_delay: Duration,
    max_retries: u32,
    enrich: bool,
    concurrency: usize,
    fetch: FetchSettings,
}

impl CrawlConfig {
    pub fn builder(seed_url: impl Into<String>) -> CrawlConfigBuilder {
        CrawlConfigBuilder::new(seed_url)
    }

    pub fn seed_url(&self) -> &Url {
        &self.seed_url
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    pub fn policy(&self) -> TraversalPolicy {
        self.policy
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn enrich(&self) -> bool {
        self.enrich
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn fetch(&self) -> &FetchSettings {
        &self.fetch
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfigBuilder {
    seed_url: String,
    keywords: Vec<String>,
    max_pages: usize,
    policy: TraversalPolicy,
    request_delay: Duration,
    max_retries: u32,
    enrich: bool,
    concurrency: usize,
    fetch: FetchSettings,
}

impl CrawlConfigBuilder {
    fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            keywords: Vec::new(),
            max_pages: DEFAULT_MAX_PAGES,
            policy: TraversalPolicy::default(),
            request_delay: DEFAULT_REQUEST_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            enrich: false,
            concurrency: DEFAULT_CONCURRENCY,
            fetch: FetchSettings::default(),
        }
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().to_owned())
            .collect();
        self
    }

    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn policy(mut self, policy: TraversalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn enrich(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn fetch_settings(mut self, fetch: FetchSettings) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn build(self) -> anyhow::Result<CrawlConfig> {
        let seed = self.seed_url.trim();
        if seed.is_empty() {
            anyhow::bail!("seed url must not be empty");
        }
        let seed_url = Url::parse(seed).with_context(|| format!("parse seed url: {seed}"))?;
        if seed_url.scheme() != "http" && seed_url.scheme() != "https" {
            anyhow::bail!("seed url must be http/https: {seed_url}");
        }
        if self.max_pages == 0 {
            anyhow::bail!("max pages must be > 0");
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be > 0");
        }
        if self.fetch.connect_timeout.is_zero() || self.fetch.read_timeout.is_zero() {
            anyhow::bail!("fetch timeouts must be > 0");
        }

        Ok(CrawlConfig {
            seed_url,
            keywords: normalize_keywords(self.keywords),
            max_pages: self.max_pages,
            policy: self.policy,
            request_delay: self.request_delay,
            max_retries: self.max_retries,
            enrich: self.enrich,
            concurrency: self.concurrency,
            fetch: self.fetch,
        })
    }
}

/// Trims keywords, drops blank ones and repeated ones (first occurrence wins).
pub fn normalize_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let keyword = keyword.trim();
        if keyword.is_empty() || out.iter().any(|k| k == keyword) {
            continue;
        }
        out.push(keyword.to_owned());
    }
    out
}
