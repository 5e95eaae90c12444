use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{CrawlResult, Page};

const SNIPPET_CHARS: usize = 500;

/// Serialized form a crawl result is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    /// Picks the format from the file extension, falling back to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Json,
        }
    }
}

/// Persists a finished crawl.
pub trait ResultSink {
    fn export(&self, result: &CrawlResult) -> anyhow::Result<()>;
}

pub fn sink_for(format: OutputFormat, path: &Path) -> Box<dyn ResultSink> {
    match format {
        OutputFormat::Json => Box::new(JsonSink::new(path)),
        OutputFormat::Csv => Box::new(CsvSink::new(path)),
    }
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    total_pages_visited: usize,
    total_relevant_pages: usize,
    visited_urls: Vec<&'a str>,
    relevant_pages: Vec<JsonPage<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonPage<'a> {
    url: &'a str,
    title: &'a str,
    content_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_analysis: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a BTreeMap<String, String>>,
    content_snippet: String,
}

impl<'a> JsonPage<'a> {
    fn from_page(page: &'a Page) -> Self {
        Self {
            url: page.url(),
            title: page.title(),
            content_length: page.content_length(),
            ai_analysis: page.enrichment(),
            metadata: Some(page.metadata()).filter(|m| !m.is_empty()),
            content_snippet: snippet(page.text(), SNIPPET_CHARS),
        }
    }
}

/// Writes one pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSink for JsonSink {
    fn export(&self, result: &CrawlResult) -> anyhow::Result<()> {
        let report = JsonReport {
            started_at: result.started_at(),
            finished_at: result.finished_at(),
            total_pages_visited: result.total_visited(),
            total_relevant_pages: result.total_relevant(),
            visited_urls: result.visited_urls().iter().map(String::as_str).collect(),
            relevant_pages: result
                .relevant_pages()
                .iter()
                .map(JsonPage::from_page)
                .collect(),
        };

        let mut out = create_output(&self.path)?;
        serde_json::to_writer_pretty(&mut out, &report).context("serialize crawl result")?;
        out.write_all(b"\n").context("write trailing newline")?;
        out.flush()
            .with_context(|| format!("flush output: {}", self.path.display()))?;

        tracing::info!(path = %self.path.display(), "exported results as json");
        Ok(())
    }
}

/// Writes relevant pages plus a summary to `path` and every visited URL to a
/// companion `<stem>_urls.csv` next to it.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn urls_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!("{stem}_urls.csv"))
    }

    fn write_pages(&self, result: &CrawlResult) -> anyhow::Result<()> {
        let mut out = create_output(&self.path)?;
        let path = self.path.display();

        writeln!(out, "URL,Title,Content Length,Has AI Analysis,Metadata")
            .with_context(|| format!("write csv header: {path}"))?;
        for page in result.relevant_pages() {
            let metadata = page
                .metadata()
                .iter()
                .map(|(key, value)| format!("{key}: {value}"))
                .collect::<Vec<_>>()
                .join("; ");
            writeln!(
                out,
                "{},{},{},{},{}",
                quote(page.url()),
                quote(page.title()),
                page.content_length(),
                if page.enrichment().is_some() { "Yes" } else { "No" },
                quote(&metadata),
            )
            .with_context(|| format!("write csv row: {path}"))?;
        }

        write!(
            out,
            "\n\nSummary\nTotal Pages Visited,{}\nTotal Relevant Pages,{}\n",
            result.total_visited(),
            result.total_relevant()
        )
        .with_context(|| format!("write csv summary: {path}"))?;
        out.flush().with_context(|| format!("flush output: {path}"))?;
        Ok(())
    }

    fn write_urls(&self, result: &CrawlResult) -> anyhow::Result<PathBuf> {
        let urls_path = self.urls_path();
        let mut out = create_output(&urls_path)?;
        writeln!(out, "Visited URLs").context("write visited urls header")?;
        for url in result.visited_urls() {
            writeln!(out, "{}", quote(url)).context("write visited url")?;
        }
        out.flush()
            .with_context(|| format!("flush output: {}", urls_path.display()))?;
        Ok(urls_path)
    }
}

impl ResultSink for CsvSink {
    fn export(&self, result: &CrawlResult) -> anyhow::Result<()> {
        self.write_pages(result)?;
        let urls_path = self.write_urls(result)?;
        tracing::info!(
            path = %self.path.display(),
            urls = %urls_path.display(),
            "exported results as csv"
        );
        Ok(())
    }
}

fn create_output(path: &Path) -> anyhow::Result<BufWriter<File>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create output: {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}
