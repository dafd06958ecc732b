//! Database schema definitions
//!
//! This module contains the SQL schema for the crawl results database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seed_url TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_recorded INTEGER NOT NULL DEFAULT 0
);

-- One row per crawled URL; a later run overwrites the row
CREATE TABLE IF NOT EXISTS pages (
    url TEXT PRIMARY KEY,
    heading TEXT,
    status TEXT NOT NULL,
    final_url TEXT,
    status_code INTEGER,
    content_type TEXT,
    links_found INTEGER NOT NULL DEFAULT 0,
    links_queued INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    fetched_at TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(id)
);

CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);
CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
