use clap::{Args, Parser, Subcommand};

use crate::config::{
    DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_PAGES, DEFAULT_MAX_RETRIES,
    DEFAULT_READ_TIMEOUT, DEFAULT_REQUEST_DELAY, DEFAULT_USER_AGENT, TraversalPolicy,
};
use crate::export::OutputFormat;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl a site from a seed URL and export the relevant pages.
    Crawl(CrawlArgs),
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Seed URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Keyword a page must mention to be kept (repeatable or comma-separated).
    /// Without keywords every HTML page is relevant.
    #[arg(long = "keyword", short = 'k', value_delimiter = ',')]
    pub keywords: Vec<String>,

    /// Maximum number of URLs to visit.
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: usize,

    /// Traversal order.
    #[arg(long, value_enum, default_value_t = TraversalPolicy::BreadthFirst)]
    pub strategy: TraversalPolicy,

    /// Minimum delay between any two requests (politeness).
    #[arg(long, default_value_t = DEFAULT_REQUEST_DELAY.as_millis() as u64)]
    pub delay_ms: u64,

    /// Attempts per URL before giving up.
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Pages processed in parallel.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Annotate relevant pages with an OpenAI analysis (needs `OPENAI_API_KEY`).
    #[arg(long)]
    pub enrich: bool,

    /// Seconds allowed for establishing a connection.
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout_secs: u64,

    /// Seconds allowed between reads of a response body.
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_secs())]
    pub read_timeout_secs: u64,

    /// Client identifier sent with every page request.
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Output file for the crawl result.
    #[arg(long)]
    pub out: String,

    /// Output format (default: inferred from the `--out` extension, else json).
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}
