//! Result sink trait and per-URL crawl records
//!
//! The crawl loop emits one [`CrawlResult`] per dequeued URL and hands it to a
//! [`ResultSink`]. What the sink does with it (store, index, print) is up to
//! the sink.

use crate::output::stats::CrawlReport;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Errors that can occur while handing results to a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write result: {0}")]
    Write(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Outcome tag of a dequeued URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrawlStatus {
    /// HTML page fetched and parsed
    Fetched,

    /// Redirected to a foreign origin; the target was not fetched
    SkippedOffOrigin,

    /// Redirected to a URL this run had already visited
    SkippedDuplicate,

    /// Content-Type was not HTML
    SkippedNonHtml,

    /// HTTP error status or transport failure
    FetchError,
}

impl CrawlStatus {
    /// Returns true if the page was fetched and parsed
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched)
    }

    /// Returns true if the page was deliberately not processed
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::SkippedOffOrigin | Self::SkippedDuplicate | Self::SkippedNonHtml
        )
    }

    /// Returns true if this represents a fetch failure
    pub fn is_error(&self) -> bool {
        matches!(self, Self::FetchError)
    }

    /// Converts the status to its stable string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::SkippedOffOrigin => "skipped-off-origin",
            Self::SkippedDuplicate => "skipped-duplicate",
            Self::SkippedNonHtml => "skipped-non-html",
            Self::FetchError => "fetch-error",
        }
    }

    /// Parses a status from its string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "fetched" => Some(Self::Fetched),
            "skipped-off-origin" => Some(Self::SkippedOffOrigin),
            "skipped-duplicate" => Some(Self::SkippedDuplicate),
            "skipped-non-html" => Some(Self::SkippedNonHtml),
            "fetch-error" => Some(Self::FetchError),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all() -> [Self; 5] {
        [
            Self::Fetched,
            Self::SkippedOffOrigin,
            Self::SkippedDuplicate,
            Self::SkippedNonHtml,
            Self::FetchError,
        ]
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-URL outcome record
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlResult {
    /// The URL taken from the frontier
    pub url: Url,

    /// Where same-origin redirects ended up, if somewhere else
    pub final_url: Option<Url>,

    pub status: CrawlStatus,

    /// Text of the page's first `<h1>`
    pub heading: Option<String>,

    /// Distinct hrefs found on the page
    pub links_found: usize,

    /// How many of those were new same-origin URLs added to the frontier
    pub links_queued: usize,

    /// HTTP status code, if a response was received
    pub status_code: Option<u16>,

    pub content_type: Option<String>,

    /// Failure description for `FetchError` and skip reasons
    pub error: Option<String>,

    pub fetched_at: DateTime<Utc>,
}

impl CrawlResult {
    /// Creates a bare record for `url`; callers fill in what they know
    pub fn new(url: Url, status: CrawlStatus) -> Self {
        Self {
            url,
            final_url: None,
            status,
            heading: None,
            links_found: 0,
            links_queued: 0,
            status_code: None,
            content_type: None,
            error: None,
            fetched_at: Utc::now(),
        }
    }
}

/// Downstream consumer of crawl results
///
/// Only the crawl coordinator calls a sink, one result at a time, so
/// implementations need no internal synchronization.
pub trait ResultSink {
    /// Accepts one result. An error is logged by the caller and the crawl
    /// continues.
    fn record(&mut self, result: CrawlResult) -> SinkResult<()>;

    /// Called once after the last result of a run
    fn finish(&mut self, _report: &CrawlReport) -> SinkResult<()> {
        Ok(())
    }
}

impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn record(&mut self, result: CrawlResult) -> SinkResult<()> {
        (**self).record(result)
    }

    fn finish(&mut self, report: &CrawlReport) -> SinkResult<()> {
        (**self).finish(report)
    }
}

/// Sink that keeps every result in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub results: Vec<CrawlResult>,
    pub report: Option<CrawlReport>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the result recorded for `url`
    pub fn get(&self, url: &str) -> Option<&CrawlResult> {
        self.results.iter().find(|r| r.url.as_str() == url)
    }

    /// Results with the given status
    pub fn with_status(&self, status: CrawlStatus) -> impl Iterator<Item = &CrawlResult> {
        self.results.iter().filter(move |r| r.status == status)
    }
}

impl ResultSink for MemorySink {
    fn record(&mut self, result: CrawlResult) -> SinkResult<()> {
        self.results.push(result);
        Ok(())
    }

    fn finish(&mut self, report: &CrawlReport) -> SinkResult<()> {
        self.report = Some(report.clone());
        Ok(())
    }
}
