//! Output module for crawl results
//!
//! This module defines what the crawl loop emits and where it goes:
//! - `CrawlResult`: one record per dequeued URL
//! - `ResultSink`: the append interface downstream consumers implement
//! - `CrawlReport`: per-run totals, logged and handed to the sink at the end
//! - Statistics printing for stored results

mod stats;
mod traits;

pub use stats::{print_report, print_statistics, CrawlReport, CrawlStatistics, StopReason};
pub use traits::{CrawlResult, CrawlStatus, MemorySink, ResultSink, SinkError, SinkResult};
