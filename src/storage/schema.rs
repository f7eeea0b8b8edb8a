//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the url-scout database.
//! Timestamps are RFC 3339 UTC strings with millisecond precision, so text
//! comparison is chronological comparison.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Recurring discovery tasks
CREATE TABLE IF NOT EXISTS url_discovery_tasks (
    id                          INTEGER PRIMARY KEY AUTOINCREMENT,
    task_name                   TEXT NOT NULL UNIQUE,
    base_url                    TEXT NOT NULL,
    source_type                 TEXT NOT NULL,
    tags                        TEXT,
    depth                       INTEGER NOT NULL DEFAULT 1,
    strategy_type               TEXT NOT NULL DEFAULT '',
    strategy_contents           TEXT NOT NULL DEFAULT '',
    exclude_suffixes            TEXT NOT NULL DEFAULT '[".js",".css"]',
    execution_interval_seconds  INTEGER NOT NULL,
    use_llm                     INTEGER NOT NULL DEFAULT 0,
    next_execution_time         TEXT,
    last_execution_time         TEXT,
    is_active                   INTEGER NOT NULL DEFAULT 1,
    success_counts              INTEGER NOT NULL DEFAULT 0,
    fail_counts                 INTEGER NOT NULL DEFAULT 0,
    create_time                 TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_due ON url_discovery_tasks(is_active, next_execution_time);

-- Every URL ever discovered, one row per (origin, url)
CREATE TABLE IF NOT EXISTS web_urls (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    origin          TEXT NOT NULL,
    url             TEXT NOT NULL,
    url_path        TEXT NOT NULL,
    depth           INTEGER NOT NULL,
    discovered_from TEXT,
    discovery_type  TEXT NOT NULL,
    source_type     TEXT,
    tags            TEXT,
    first_seen_at   TEXT NOT NULL,
    last_seen_at    TEXT NOT NULL,
    UNIQUE(origin, url)
);

CREATE INDEX IF NOT EXISTS idx_web_urls_origin ON web_urls(origin);
CREATE INDEX IF NOT EXISTS idx_web_urls_path ON web_urls(url_path);
CREATE INDEX IF NOT EXISTS idx_web_urls_source_type ON web_urls(source_type);

-- Ad-hoc crawls submitted outside the scheduler
CREATE TABLE IF NOT EXISTS crawl_runs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    origin      TEXT NOT NULL,
    start_url   TEXT NOT NULL,
    max_depth   INTEGER NOT NULL,
    max_pages   INTEGER NOT NULL,
    status      TEXT NOT NULL,
    total_urls  INTEGER NOT NULL DEFAULT 0,
    started_at  TEXT NOT NULL,
    finished_at TEXT
);
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
