use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};

/// A fetched HTML page. Identity is the URL alone.
#[derive(Debug, Clone)]
pub struct Page {
    url: String,
    title: String,
    text: String,
    enrichment: Option<String>,
    metadata: BTreeMap<String, String>,
}

impl Page {
    pub fn new(url: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            text: text.into(),
            enrichment: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn enrichment(&self) -> Option<&str> {
        self.enrichment.as_deref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn set_enrichment(&mut self, annotation: impl Into<String>) {
        self.enrichment = Some(annotation.into());
    }

    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Length of the extracted text in characters.
    pub fn content_length(&self) -> usize {
        self.text.chars().count()
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Page {}

impl Hash for Page {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

/// Final snapshot of one crawl.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    visited_urls: BTreeSet<String>,
    relevant_pages: Vec<Page>,
    cancelled: bool,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl CrawlResult {
    pub fn new(
        visited_urls: impl IntoIterator<Item = String>,
        relevant_pages: Vec<Page>,
        cancelled: bool,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            visited_urls: visited_urls.into_iter().collect(),
            relevant_pages,
            cancelled,
            started_at,
            finished_at,
        }
    }

    pub fn visited_urls(&self) -> &BTreeSet<String> {
        &self.visited_urls
    }

    /// Relevant pages in the order they were found.
    pub fn relevant_pages(&self) -> &[Page] {
        &self.relevant_pages
    }

    pub fn total_visited(&self) -> usize {
        self.visited_urls.len()
    }

    pub fn total_relevant(&self) -> usize {
        self.relevant_pages.len()
    }

    /// True when the crawl stopped on an external signal before running out of
    /// work or budget.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }
}
