//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with same-origin redirect handling
//! - Heading and link extraction
//! - The frontier of visited and pending URLs
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;

pub use coordinator::{CancelHandle, Coordinator};
pub use fetcher::{
    build_http_client, is_html_content_type, FetchOutcome, HttpFetcher, PageFetcher,
    TransportErrorKind, MAX_BODY_BYTES, MAX_REDIRECTS,
};
pub use frontier::{Frontier, SharedFrontier};
pub use parser::{parse_page, ParsedPage};

use crate::config::Config;
use crate::output::{CrawlReport, ResultSink};
use crate::Result;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and seed, and derive the run's origin
/// 2. Build the HTTP client
/// 3. Crawl every reachable same-origin page into `sink`
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `sink` - Receives one result per fetched URL
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl ran to completion
/// * `Err(CrawlError)` - Invalid configuration, invalid seed or HTTP client
///   construction failure
pub async fn crawl<S: ResultSink + ?Sized>(config: Config, sink: &mut S) -> Result<CrawlReport> {
    let coordinator = Coordinator::new(config)?;
    Ok(coordinator.run(sink).await)
}
