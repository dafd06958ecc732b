//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator owns one run's state:
//! - the normalized seed and the [`Origin`] it fixes for the run
//! - the [`SharedFrontier`] every worker draws from
//! - a pool of fetch workers (tokio tasks in a `JoinSet`)
//!
//! Workers fetch, parse and offer discovered links straight into the frontier.
//! Their [`CrawlResult`]s flow back to the dispatch loop, which is the only
//! caller of the [`ResultSink`].

use crate::config::{validate, Config};
use crate::crawler::fetcher::{FetchOutcome, HttpFetcher, PageFetcher};
use crate::crawler::frontier::SharedFrontier;
use crate::crawler::parser::parse_page;
use crate::output::{CrawlReport, CrawlResult, CrawlStatus, ResultSink, StopReason};
use crate::url::{admit_href, normalize_url, Admission, Origin};
use crate::{CrawlError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

/// Requests that a running crawl stop dispatching new fetches
///
/// Fetches already in flight still complete and are recorded. Cloning the
/// handle is cheap; every clone controls the same run.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Link counters gathered by one worker
#[derive(Debug, Default)]
struct LinkTally {
    off_origin: u64,
    duplicate: u64,
    unresolvable: u64,
}

/// What a worker hands back to the dispatch loop
#[derive(Debug)]
struct Processed {
    result: CrawlResult,
    links: LinkTally,
}

/// Main crawler coordinator structure
pub struct Coordinator<F: PageFetcher = HttpFetcher> {
    config: Config,
    seed: Url,
    origin: Origin,
    fetcher: Arc<F>,
    frontier: SharedFrontier,
    cancel: CancelHandle,
}

impl Coordinator<HttpFetcher> {
    /// Creates a coordinator that fetches over HTTP
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Seed validated and HTTP client built
    /// * `Err(CrawlError)` - Invalid configuration, invalid seed or client
    ///   construction failure
    pub fn new(config: Config) -> Result<Self> {
        let (seed, origin) = seed_origin(&config)?;
        let fetcher = HttpFetcher::new(&config, origin.clone())?;
        Ok(Self::assemble(config, seed, origin, fetcher))
    }
}

impl<F: PageFetcher> Coordinator<F> {
    /// Creates a coordinator around a custom fetcher
    pub fn with_fetcher(config: Config, fetcher: F) -> Result<Self> {
        let (seed, origin) = seed_origin(&config)?;
        Ok(Self::assemble(config, seed, origin, fetcher))
    }

    fn assemble(config: Config, seed: Url, origin: Origin, fetcher: F) -> Self {
        Self {
            config,
            seed,
            origin,
            fetcher: Arc::new(fetcher),
            frontier: SharedFrontier::new(),
            cancel: CancelHandle::new(),
        }
    }

    /// The normalized seed URL
    pub fn seed(&self) -> &Url {
        &self.seed
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Handle for stopping this run from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Crawls from the seed until the frontier drains, the page budget is
    /// spent or the run is cancelled
    ///
    /// Every dispatched URL produces exactly one result in `sink`. Sink
    /// failures are logged and counted in the report; they never abort the
    /// crawl.
    pub async fn run<S: ResultSink + ?Sized>(self, sink: &mut S) -> CrawlReport {
        let started = Instant::now();
        let mut report = CrawlReport::new(self.seed.as_str(), self.origin.to_string());

        let max_workers = self.config.crawler.max_concurrent_fetches as usize;
        let budget = self.config.crawler.page_budget();
        let mut cancel_rx = self.cancel.subscribe();
        let mut workers: JoinSet<Processed> = JoinSet::new();
        let mut dispatched: u64 = 0;
        let mut stop: Option<StopReason> = None;

        tracing::info!(
            "Starting crawl of {} ({} workers, origin {})",
            self.seed,
            max_workers,
            self.origin
        );
        self.frontier.offer(self.seed.clone());

        loop {
            if stop.is_none() && *cancel_rx.borrow() {
                tracing::info!("Cancel requested, draining {} in-flight fetches", workers.len());
                stop = Some(StopReason::Cancelled);
            }

            while stop.is_none() && workers.len() < max_workers {
                if budget.is_some_and(|limit| dispatched >= limit) {
                    if !self.frontier.is_empty() {
                        tracing::info!("Page budget of {} reached", dispatched);
                        stop = Some(StopReason::PageBudget);
                    }
                    break;
                }

                let Some(url) = self.frontier.next() else {
                    break;
                };

                tracing::debug!("Dispatching {}", url);
                dispatched += 1;
                workers.spawn(process_url(
                    Arc::clone(&self.fetcher),
                    self.frontier.clone(),
                    self.origin.clone(),
                    url,
                ));
            }

            if workers.is_empty() {
                break;
            }

            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok(processed)) => {
                        emit(sink, &mut report, processed);
                        if report.pages_total() % 10 == 0 {
                            tracing::info!(
                                "Progress: {} pages recorded, {} in frontier, {} in flight",
                                report.pages_total(),
                                self.frontier.len(),
                                workers.len()
                            );
                        }
                    }
                    Some(Err(e)) => tracing::error!("Fetch worker failed: {}", e),
                    None => {}
                },
                changed = cancel_rx.changed(), if stop.is_none() => {
                    if changed.is_ok() && *cancel_rx.borrow() {
                        tracing::info!("Cancel requested, draining {} in-flight fetches", workers.len());
                        stop = Some(StopReason::Cancelled);
                    }
                }
            }
        }

        report.stop_reason = stop.unwrap_or_default();
        report.elapsed = started.elapsed();
        report.urls_visited = self.frontier.lock().visited_count() as u64;

        log_summary(&report);

        if let Err(e) = sink.finish(&report) {
            tracing::warn!("Failed to finalize results: {}", e);
            report.sink_errors += 1;
        }

        report
    }
}

/// Validates the configuration, normalizes the seed and derives the run's
/// origin
fn seed_origin(config: &Config) -> Result<(Url, Origin)> {
    let raw = config.crawler.seed_url.trim();
    let invalid = |source| CrawlError::InvalidSeed {
        url: raw.to_string(),
        source,
    };

    let seed = normalize_url(raw).map_err(invalid)?;
    let origin = Origin::from_url(&seed).map_err(invalid)?;
    validate(config)?;
    Ok((seed, origin))
}

/// Hands one worker's result to the sink and folds it into the report
fn emit<S: ResultSink + ?Sized>(sink: &mut S, report: &mut CrawlReport, processed: Processed) {
    let Processed { result, links } = processed;

    report.off_origin_links += links.off_origin;
    report.duplicate_links += links.duplicate;
    report.unresolvable_links += links.unresolvable;
    report.record(&result);

    match result.status {
        CrawlStatus::Fetched => tracing::debug!(
            "Fetched {} ({} links, {} queued)",
            result.url,
            result.links_found,
            result.links_queued
        ),
        CrawlStatus::FetchError => tracing::warn!(
            "Failed to fetch {}: {}",
            result.url,
            result.error.as_deref().unwrap_or("unknown error")
        ),
        status => tracing::debug!("Skipped {} ({})", result.url, status),
    }

    let url = result.url.clone();
    if let Err(e) = sink.record(result) {
        tracing::warn!("Failed to record result for {}: {}", url, e);
        report.sink_errors += 1;
    }
}

/// Fetches one URL and turns the outcome into a result
///
/// Runs on a worker task. The frontier lock is taken only for the redirect
/// check and for one batch of offers, never across the fetch.
async fn process_url<F: PageFetcher>(
    fetcher: Arc<F>,
    frontier: SharedFrontier,
    origin: Origin,
    url: Url,
) -> Processed {
    let outcome = fetcher.fetch(&url).await;
    let mut result = CrawlResult::new(url.clone(), CrawlStatus::Fetched);
    let mut links = LinkTally::default();

    match outcome {
        FetchOutcome::Html {
            final_url,
            status_code,
            content_type,
            body,
        } => {
            result.status_code = Some(status_code);
            result.content_type = Some(content_type);

            if final_url != url {
                result.final_url = Some(final_url.clone());
                if !frontier.mark_visited(final_url.clone()) {
                    result.status = CrawlStatus::SkippedDuplicate;
                    result.error = Some(format!("redirected to already visited {}", final_url));
                    return Processed { result, links };
                }
            }

            let page = parse_page(&body);
            result.heading = page.heading;
            result.links_found = page.hrefs.len();

            let mut admitted = Vec::with_capacity(page.hrefs.len());
            for href in &page.hrefs {
                match admit_href(href, &final_url, &origin) {
                    Admission::Admitted(link) => admitted.push(link),
                    Admission::OffOrigin(link) => {
                        tracing::debug!("Dropping off-origin link {} on {}", link, final_url);
                        links.off_origin += 1;
                    }
                    Admission::Unresolvable => {
                        tracing::debug!("Dropping unresolvable href {:?} on {}", href, final_url);
                        links.unresolvable += 1;
                    }
                }
            }

            let mut queue = frontier.lock();
            for link in admitted {
                if queue.offer(link) {
                    result.links_queued += 1;
                } else {
                    links.duplicate += 1;
                }
            }
        }

        FetchOutcome::NonHtml {
            final_url,
            status_code,
            content_type,
        } => {
            result.status = CrawlStatus::SkippedNonHtml;
            result.status_code = Some(status_code);
            result.content_type = content_type;
            result.final_url = redirected(&frontier, &url, final_url);
        }

        FetchOutcome::OffOriginRedirect {
            location,
            status_code,
        } => {
            result.status = CrawlStatus::SkippedOffOrigin;
            result.status_code = Some(status_code);
            result.error = Some(format!("redirected off-origin to {}", location));
        }

        FetchOutcome::HttpError {
            final_url,
            status_code,
        } => {
            result.status = CrawlStatus::FetchError;
            result.status_code = Some(status_code);
            result.error = Some(format!("HTTP {}", status_code));
            result.final_url = redirected(&frontier, &url, final_url);
        }

        FetchOutcome::TransportError { kind, message } => {
            result.status = CrawlStatus::FetchError;
            result.error = Some(format!("{}: {}", kind, message));
        }
    }

    Processed { result, links }
}

/// Marks a same-origin redirect target visited and returns it for the record
fn redirected(frontier: &SharedFrontier, url: &Url, final_url: Url) -> Option<Url> {
    if &final_url == url {
        return None;
    }
    frontier.mark_visited(final_url.clone());
    Some(final_url)
}

fn log_summary(report: &CrawlReport) {
    tracing::info!(
        "Crawl {} after {:.1}s: {} pages recorded ({} fetched, {} non-HTML, {} off-origin redirects, {} duplicate redirects, {} errors)",
        report.stop_reason,
        report.elapsed.as_secs_f64(),
        report.pages_total(),
        report.count(CrawlStatus::Fetched),
        report.count(CrawlStatus::SkippedNonHtml),
        report.count(CrawlStatus::SkippedOffOrigin),
        report.count(CrawlStatus::SkippedDuplicate),
        report.count(CrawlStatus::FetchError)
    );
    tracing::info!(
        "Links: {} found, {} queued, {} off-origin, {} already visited, {} unresolvable",
        report.links_found,
        report.links_queued,
        report.off_origin_links,
        report.duplicate_links,
        report.unresolvable_links
    );
}
