//! Run reports and statistics
//!
//! [`CrawlReport`] is assembled by the coordinator while a crawl runs and
//! handed to the sink at the end. [`CrawlStatistics`] is the stored-results
//! view used by `--stats`.

use crate::output::traits::{CrawlResult, CrawlStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Why a crawl run stopped dispatching fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The frontier ran dry and no fetch was in flight
    #[default]
    Exhausted,
    /// An external cancel request arrived
    Cancelled,
    /// The configured page budget was used up
    PageBudget,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
            Self::PageBudget => "page-budget",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one crawl run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    /// Normalized seed URL
    pub seed: String,

    /// The run's origin as `scheme://host:port`
    pub origin: String,

    /// Results emitted, by status
    pub pages_by_status: BTreeMap<CrawlStatus, u64>,

    /// Distinct hrefs seen on fetched pages
    pub links_found: u64,

    /// Links that entered the frontier
    pub links_queued: u64,

    /// Links dropped because they point to another origin
    pub off_origin_links: u64,

    /// Same-origin links dropped because they were already visited
    pub duplicate_links: u64,

    /// Hrefs that could not be resolved into a crawlable URL
    pub unresolvable_links: u64,

    /// Results the sink failed to accept
    pub sink_errors: u64,

    /// Distinct URLs seen by the frontier
    pub urls_visited: u64,

    pub stop_reason: StopReason,

    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn new(seed: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Accounts for one emitted result
    pub fn record(&mut self, result: &CrawlResult) {
        *self.pages_by_status.entry(result.status).or_insert(0) += 1;
        self.links_found += result.links_found as u64;
        self.links_queued += result.links_queued as u64;
    }

    /// Total results emitted
    pub fn pages_total(&self) -> u64 {
        self.pages_by_status.values().sum()
    }

    /// Results emitted with `status`
    pub fn count(&self, status: CrawlStatus) -> u64 {
        self.pages_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Crawl statistics loaded from stored results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Total number of stored pages
    pub total_pages: u64,

    /// Count of pages by status
    pub pages_by_status: BTreeMap<CrawlStatus, u64>,

    /// Pages that have a heading for the index
    pub pages_with_heading: u64,

    /// Number of crawl runs recorded
    pub runs: u64,
}

/// Prints a finished run's report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Seed: {}", report.seed);
    println!("Origin: {}", report.origin);
    println!("Stopped: {}", report.stop_reason);
    println!("Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    println!();

    println!("Pages by Status:");
    for (status, count) in &report.pages_by_status {
        println!("  {}: {}", status, count);
    }
    println!("  total: {}", report.pages_total());
    println!();

    println!("Links:");
    println!("  Found on pages: {}", report.links_found);
    println!("  Queued: {}", report.links_queued);
    println!("  Off-origin: {}", report.off_origin_links);
    println!("  Already visited: {}", report.duplicate_links);
    println!("  Unresolvable: {}", report.unresolvable_links);

    if report.sink_errors > 0 {
        println!();
        println!("Sink errors: {}", report.sink_errors);
    }
}

/// Prints stored statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Runs recorded: {}", stats.runs);
    println!("  Total pages: {}", stats.total_pages);
    println!("  Pages with heading: {}", stats.pages_with_heading);
    println!();

    println!("Pages by Status:");
    let mut status_counts: Vec<_> = stats.pages_by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (status, count) in status_counts {
        let percentage = if stats.total_pages > 0 {
            (*count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    let fetched = stats
        .pages_by_status
        .get(&CrawlStatus::Fetched)
        .unwrap_or(&0);
    let success_rate = if stats.total_pages > 0 {
        (*fetched as f64 / stats.total_pages as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages fetched)",
        success_rate, fetched, stats.total_pages
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn result(path: &str, status: CrawlStatus, found: usize, queued: usize) -> CrawlResult {
        let url = Url::parse(&format!("http://site.test{}", path)).unwrap();
        CrawlResult {
            links_found: found,
            links_queued: queued,
            ..CrawlResult::new(url, status)
        }
    }

    #[test]
    fn test_report_accumulates_results() {
        let mut report = CrawlReport::new("http://site.test/a", "http://site.test:80");
        report.record(&result("/a", CrawlStatus::Fetched, 3, 2));
        report.record(&result("/b", CrawlStatus::Fetched, 1, 0));
        report.record(&result("/c", CrawlStatus::FetchError, 0, 0));

        assert_eq!(report.pages_total(), 3);
        assert_eq!(report.count(CrawlStatus::Fetched), 2);
        assert_eq!(report.count(CrawlStatus::FetchError), 1);
        assert_eq!(report.count(CrawlStatus::SkippedNonHtml), 0);
        assert_eq!(report.links_found, 4);
        assert_eq!(report.links_queued, 2);
    }

    #[test]
    fn test_new_report_defaults() {
        let report = CrawlReport::new("seed", "origin");
        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(report.pages_total(), 0);
    }

    #[test]
    fn test_stop_reason_strings() {
        assert_eq!(StopReason::Exhausted.to_string(), "exhausted");
        assert_eq!(StopReason::Cancelled.to_string(), "cancelled");
        assert_eq!(StopReason::PageBudget.to_string(), "page-budget");
    }
}
