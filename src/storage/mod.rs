//! Storage module for persisting crawl results
//!
//! This module handles the results database:
//! - SQLite database initialization and schema management
//! - Run tracking (seed, config fingerprint, final status)
//! - Per-URL result rows for the downstream indexer

mod schema;
mod sqlite;

pub use sqlite::SqliteSink;

use crate::output::{CrawlStatus, StopReason};

/// Represents a stored page result
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub url: String,
    pub heading: Option<String>,
    pub status: CrawlStatus,
    pub final_url: Option<String>,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub links_found: u64,
    pub links_queued: u64,
    pub error_message: Option<String>,
    pub fetched_at: String,
    pub run_id: i64,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub seed_url: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages_recorded: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

impl From<StopReason> for RunStatus {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Exhausted | StopReason::PageBudget => Self::Completed,
            StopReason::Cancelled => Self::Interrupted,
        }
    }
}
