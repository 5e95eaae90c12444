use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::cli::CrawlArgs;
use crate::config::{CrawlConfig, FetchSettings};
use crate::enrich::{Enricher, OpenAiEnricher};
use crate::export::{OutputFormat, sink_for};
use crate::extract::{Extractor, HtmlExtractor};
use crate::fetch::{FetchError, HttpFetcher, PageFetcher};
use crate::frontier::{Frontier, FrontierEntry};
use crate::model::{CrawlResult, Page};
use crate::rate_limit::RateLimiter;
use crate::relevance::is_relevant;

/// What a worker reports back for one claimed URL.
#[derive(Debug)]
enum Visit {
    /// A fetch was attempted. `page` is set only for relevant pages.
    Attempted {
        page: Option<Page>,
        links: Vec<String>,
    },
    /// No request was made because the crawl is stopping.
    NotStarted,
}

#[derive(Debug)]
struct VisitOutcome {
    entry: FrontierEntry,
    visit: Visit,
}

/// Drives a crawl: owns the frontier, hands claimed URLs to a bounded set of
/// workers and folds their outcomes back into the visited set and the
/// relevant-page list.
#[derive(Clone)]
pub struct Crawler {
    config: Arc<CrawlConfig>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    enricher: Option<Arc<dyn Enricher>>,
}

impl Crawler {
    pub fn new(
        config: CrawlConfig,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            extractor,
            enricher: None,
        }
    }

    /// HTTP fetcher, HTML extractor and, when enabled, the OpenAI enricher.
    pub fn from_config(config: CrawlConfig) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::from_config(&config).context("build fetcher")?;
        let enrich = config.enrich();
        let mut crawler = Self::new(config, Arc::new(fetcher), Arc::new(HtmlExtractor));
        if enrich {
            let enricher = OpenAiEnricher::from_env().context("build enricher")?;
            crawler = crawler.with_enricher(Arc::new(enricher));
        }
        Ok(crawler)
    }

    /// Sets the enricher. It is only consulted when the config enables
    /// enrichment.
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub async fn crawl(&self) -> CrawlResult {
        self.crawl_until(CancellationToken::new()).await
    }

    /// Runs the crawl until the frontier is exhausted, the page budget is
    /// spent or `stop` fires. After a stop, in-flight pages are finished and
    /// the partial result is returned.
    pub async fn crawl_until(&self, stop: CancellationToken) -> CrawlResult {
        let started_at = Utc::now();
        let config = &self.config;
        let limiter =
            Arc::new(RateLimiter::new(config.request_delay()).with_stop_signal(stop.clone()));
        let mut frontier = Frontier::new(
            config.policy(),
            [config.seed_url().to_string()],
            config.max_pages(),
        );
        let mut relevant_pages: Vec<Page> = Vec::new();
        let mut join_set: JoinSet<VisitOutcome> = JoinSet::new();
        let mut stopping = false;

        tracing::info!(
            seed = %config.seed_url(),
            policy = %config.policy(),
            max_pages = config.max_pages(),
            keywords = ?config.keywords(),
            concurrency = config.concurrency(),
            "starting crawl"
        );

        loop {
            if !stopping && stop.is_cancelled() {
                tracing::info!(in_flight = join_set.len(), "stop requested; finishing in-flight pages");
                stopping = true;
            }

            while !stopping && join_set.len() < config.concurrency() && frontier.has_next() {
                let Some(entry) = frontier.pop_next() else {
                    break;
                };
                tracing::info!(
                    url = %entry.url,
                    depth = entry.depth,
                    visited = frontier.visited_len(),
                    max_pages = config.max_pages(),
                    "crawling"
                );
                let crawler = self.clone();
                let limiter = Arc::clone(&limiter);
                join_set.spawn(async move { crawler.visit(entry, &limiter).await });
            }

            if join_set.is_empty() {
                break;
            }

            let joined = tokio::select! {
                _ = stop.cancelled(), if !stopping => continue,
                Some(joined) = join_set.join_next() => joined,
                else => break,
            };

            match joined {
                Ok(outcome) => self.settle(&mut frontier, &mut relevant_pages, outcome),
                // The claimed URL stays in flight and keeps counting against
                // the budget.
                Err(err) => tracing::error!(?err, "crawl worker failed"),
            }
        }

        let result = CrawlResult::new(
            frontier.into_visited(),
            relevant_pages,
            stopping,
            started_at,
            Utc::now(),
        );
        tracing::info!(
            visited = result.total_visited(),
            relevant = result.total_relevant(),
            cancelled = result.cancelled(),
            "crawl complete"
        );
        result
    }

    /// Scheduling step: queue new links, then account for the visited URL.
    fn settle(&self, frontier: &mut Frontier, relevant_pages: &mut Vec<Page>, outcome: VisitOutcome) {
        let VisitOutcome { entry, visit } = outcome;
        match visit {
            Visit::NotStarted => frontier.release(&entry.url),
            Visit::Attempted { page, links } => {
                if let Some(page) = page {
                    tracing::info!(url = page.url(), title = page.title(), "found relevant page");
                    relevant_pages.push(page);
                }
                let mut added = 0usize;
                for link in links {
                    if !frontier.is_visited(&link) && frontier.add_url(link, entry.depth + 1) {
                        added += 1;
                    }
                }
                frontier.mark_visited(&entry.url);
                tracing::debug!(url = %entry.url, new_links = added, pending = frontier.pending_len(), "scheduled");
            }
        }
    }

    /// Fetch, extract, filter and optionally enrich one URL. Per-URL failures
    /// end here as "no page produced".
    async fn visit(&self, entry: FrontierEntry, limiter: &RateLimiter) -> VisitOutcome {
        let markup = match self.fetcher.fetch(&entry.url, limiter).await {
            Ok(Some(markup)) => markup,
            Ok(None) => return attempted(entry, None, Vec::new()),
            Err(FetchError::Stopped { attempts: 0, .. }) => {
                return VisitOutcome {
                    entry,
                    visit: Visit::NotStarted,
                };
            }
            Err(err) => {
                tracing::warn!(url = %entry.url, err = %err, "fetch failed");
                return attempted(entry, None, Vec::new());
            }
        };

        let base = match Url::parse(&entry.url) {
            Ok(base) => base,
            Err(err) => {
                tracing::warn!(url = %entry.url, ?err, "unparseable page url");
                return attempted(entry, None, Vec::new());
            }
        };

        let extracted = self.extractor.extract(&markup, &base);
        let links = extracted.links.into_iter().collect::<Vec<_>>();
        let keywords = self.config.keywords();
        if !is_relevant(&extracted.title, &extracted.text, keywords) {
            return attempted(entry, None, links);
        }

        let mut page = Page::new(entry.url.clone(), extracted.title, extracted.text);
        page.insert_metadata("depth", entry.depth.to_string());
        if let Some(description) = extracted.description {
            page.insert_metadata("description", description);
        }
        if self.config.enrich()
            && let Some(enricher) = &self.enricher
        {
            let annotation = enricher.analyze(page.text(), keywords).await;
            page.set_enrichment(annotation);
        }
        attempted(entry, Some(page), links)
    }
}

fn attempted(entry: FrontierEntry, page: Option<Page>, links: Vec<String>) -> VisitOutcome {
    VisitOutcome {
        entry,
        visit: Visit::Attempted { page, links },
    }
}

pub async fn run(args: CrawlArgs) -> anyhow::Result<()> {
    let out = PathBuf::from(&args.out);
    let format = args
        .format
        .unwrap_or_else(|| OutputFormat::from_path(&out));

    let config = CrawlConfig::builder(args.url.as_str())
        .keywords(&args.keywords)
        .max_pages(args.max_pages)
        .policy(args.strategy)
        .request_delay(Duration::from_millis(args.delay_ms))
        .max_retries(args.max_retries)
        .concurrency(args.concurrency)
        .enrich(args.enrich)
        .fetch_settings(FetchSettings {
            user_agent: args.user_agent.clone(),
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            read_timeout: Duration::from_secs(args.read_timeout_secs),
            ..FetchSettings::default()
        })
        .build()
        .context("invalid crawl configuration")?;

    let crawler = Crawler::from_config(config)?;

    let stop = CancellationToken::new();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; stopping crawl");
            signal_stop.cancel();
        }
    });

    let result = crawler.crawl_until(stop).await;

    println!("Total pages visited: {}", result.total_visited());
    println!("Total relevant pages found: {}", result.total_relevant());

    let sink = sink_for(format, &out);
    sink.export(&result)
        .with_context(|| format!("export results to {}", out.display()))?;
    println!("Results saved to: {}", out.display());

    Ok(())
}
