//! SQLite result sink
//!
//! This module provides a SQLite-backed implementation of [`ResultSink`].

use crate::output::{
    CrawlReport, CrawlResult, CrawlStatistics, CrawlStatus, ResultSink, SinkError, SinkResult,
};
use crate::storage::schema::initialize_schema;
use crate::storage::{PageRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite results database
///
/// One row per URL in `pages`, one row per crawl in `runs`. Results can only
/// be recorded after [`SqliteSink::begin_run`].
pub struct SqliteSink {
    conn: Connection,
    run_id: Option<i64>,
    recorded: u64,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(SinkError)` - Failed to open database
    pub fn new(path: &Path) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            run_id: None,
            recorded: 0,
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            run_id: None,
            recorded: 0,
        })
    }

    /// Starts a new run and makes it the target of subsequent records
    pub fn begin_run(&mut self, seed_url: &str, config_hash: &str) -> SinkResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (seed_url, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![seed_url, now, config_hash, RunStatus::Running.to_db_string()],
        )?;

        let run_id = self.conn.last_insert_rowid();
        self.run_id = Some(run_id);
        self.recorded = 0;
        Ok(run_id)
    }

    /// ID of the active run, if any
    pub fn run_id(&self) -> Option<i64> {
        self.run_id
    }

    pub fn get_run(&self, run_id: i64) -> SinkResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, seed_url, started_at, finished_at, config_hash, status, pages_recorded
                 FROM runs WHERE id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        seed_url: row.get(1)?,
                        started_at: row.get(2)?,
                        finished_at: row.get(3)?,
                        config_hash: row.get(4)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                            .unwrap_or(RunStatus::Running),
                        pages_recorded: row.get::<_, i64>(6)? as u64,
                    })
                },
            )
            .optional()?;

        Ok(run)
    }

    /// Loads the stored row for `url`
    pub fn get_page(&self, url: &str) -> SinkResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                "SELECT url, heading, status, final_url, status_code, content_type,
                 links_found, links_queued, error_message, fetched_at, run_id
                 FROM pages WHERE url = ?1",
                params![url],
                |row| {
                    let status: String = row.get(2)?;
                    Ok(PageRecord {
                        url: row.get(0)?,
                        heading: row.get(1)?,
                        status: CrawlStatus::from_db_string(&status)
                            .unwrap_or(CrawlStatus::FetchError),
                        final_url: row.get(3)?,
                        status_code: row.get(4)?,
                        content_type: row.get(5)?,
                        links_found: row.get::<_, i64>(6)? as u64,
                        links_queued: row.get::<_, i64>(7)? as u64,
                        error_message: row.get(8)?,
                        fetched_at: row.get(9)?,
                        run_id: row.get(10)?,
                    })
                },
            )
            .optional()?;

        Ok(page)
    }

    pub fn count_total_pages(&self) -> SinkResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Stored pages grouped by status; statuses with no rows are omitted
    pub fn count_pages_by_status(&self) -> SinkResult<BTreeMap<CrawlStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM pages GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = CrawlStatus::from_db_string(&status) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }

    /// `(url, heading)` pairs for every page with a heading, ordered by URL
    pub fn headings(&self) -> SinkResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, heading FROM pages WHERE heading IS NOT NULL ORDER BY url",
        )?;

        let headings = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(headings)
    }

    pub fn count_runs(&self) -> SinkResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Gathers the numbers printed by `--stats`
    pub fn statistics(&self) -> SinkResult<CrawlStatistics> {
        let pages_with_heading: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE heading IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(CrawlStatistics {
            total_pages: self.count_total_pages()?,
            pages_by_status: self.count_pages_by_status()?,
            pages_with_heading: pages_with_heading as u64,
            runs: self.count_runs()?,
        })
    }

    fn active_run(&self) -> SinkResult<i64> {
        self.run_id
            .ok_or_else(|| SinkError::Write("no active run; call begin_run first".to_string()))
    }
}

impl ResultSink for SqliteSink {
    fn record(&mut self, result: CrawlResult) -> SinkResult<()> {
        let run_id = self.active_run()?;

        self.conn.execute(
            "INSERT INTO pages (url, heading, status, final_url, status_code, content_type,
             links_found, links_queued, error_message, fetched_at, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(url) DO UPDATE SET
                heading = excluded.heading,
                status = excluded.status,
                final_url = excluded.final_url,
                status_code = excluded.status_code,
                content_type = excluded.content_type,
                links_found = excluded.links_found,
                links_queued = excluded.links_queued,
                error_message = excluded.error_message,
                fetched_at = excluded.fetched_at,
                run_id = excluded.run_id",
            params![
                result.url.as_str(),
                result.heading,
                result.status.as_str(),
                result.final_url.as_ref().map(|u| u.as_str()),
                result.status_code,
                result.content_type,
                result.links_found as i64,
                result.links_queued as i64,
                result.error,
                result.fetched_at.to_rfc3339(),
                run_id
            ],
        )?;

        self.recorded += 1;
        Ok(())
    }

    fn finish(&mut self, report: &CrawlReport) -> SinkResult<()> {
        let run_id = self.active_run()?;
        let now = Utc::now().to_rfc3339();
        let status = RunStatus::from(report.stop_reason);

        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_recorded = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, self.recorded as i64, run_id],
        )?;

        self.run_id = None;
        Ok(())
    }
}
