//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `TaskStore` and
//! `UrlStore` traits. The connection lives behind a mutex and every call runs
//! on tokio's blocking pool.

use crate::discovery::{DiscoveryType, TraversalLimits};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, TaskStore, UrlStore};
use crate::storage::{format_timestamp, CrawlRun, CrawlRunStatus, StoredUrl, UrlRecord};
use crate::task::{interval_duration, DiscoveryTask, NewTask, TaskPatch};
use crate::url::matches_excluded_suffix;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TASK_COLUMNS: &str = "id, task_name, base_url, source_type, tags, depth, \
     strategy_type, strategy_contents, exclude_suffixes, execution_interval_seconds, \
     use_llm, next_execution_time, last_execution_time, is_active, success_counts, \
     fail_counts, create_time";

const URL_COLUMNS: &str = "id, origin, url, url_path, depth, discovered_from, \
     discovery_type, source_type, tags, first_seen_at, last_seen_at";

const CRAWL_RUN_COLUMNS: &str =
    "id, origin, start_url, max_depth, max_pages, status, total_urls, started_at, finished_at";

/// SQLite storage backend
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory database (tests and throwaway runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` against the connection on the blocking pool
    async fn with_conn<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Database(format!("storage task failed: {}", e)))?
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn create_task(&self, task: &NewTask, now: DateTime<Utc>) -> StorageResult<DiscoveryTask> {
        let task = task.clone();
        self.with_conn(move |conn| {
            let name = task.task_name.trim().to_string();
            if task_id_by_name(conn, &name)?.is_some() {
                return Err(StorageError::DuplicateTaskName(name));
            }

            let next = now + interval_duration(task.execution_interval_seconds);
            conn.execute(
                "INSERT INTO url_discovery_tasks (
                    task_name, base_url, source_type, tags, depth, strategy_type,
                    strategy_contents, exclude_suffixes, execution_interval_seconds, use_llm,
                    next_execution_time, is_active, success_counts, fail_counts, create_time
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, 0, 0, ?12)",
                params![
                    name,
                    task.base_url.trim(),
                    task.source_type,
                    task.tags,
                    task.depth,
                    task.strategy_type,
                    task.strategy_contents,
                    encode_suffixes(&task.exclude_suffixes)?,
                    to_db_int(task.execution_interval_seconds),
                    task.use_llm,
                    format_timestamp(next),
                    format_timestamp(now),
                ],
            )
            .map_err(|e| duplicate_name_or(e, &name))?;

            load_task(conn, conn.last_insert_rowid())
        })
        .await
    }

    async fn get_task(&self, id: i64) -> StorageResult<DiscoveryTask> {
        self.with_conn(move |conn| load_task(conn, id)).await
    }

    async fn list_tasks(&self, skip: usize, limit: usize) -> StorageResult<Vec<DiscoveryTask>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM url_discovery_tasks
                 ORDER BY create_time DESC, id DESC LIMIT ?1 OFFSET ?2",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map(
                    params![to_db_int(limit as u64), to_db_int(skip as u64)],
                    task_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> StorageResult<DiscoveryTask> {
        let patch = patch.clone();
        self.with_conn(move |conn| {
            let mut task = load_task(conn, id)?;

            if let Some(name) = &patch.task_name {
                let name = name.trim();
                if matches!(task_id_by_name(conn, name)?, Some(other) if other != id) {
                    return Err(StorageError::DuplicateTaskName(name.to_string()));
                }
            }

            patch.apply_to(&mut task);

            conn.execute(
                "UPDATE url_discovery_tasks SET
                    task_name = ?1, base_url = ?2, source_type = ?3, tags = ?4, depth = ?5,
                    strategy_type = ?6, strategy_contents = ?7, exclude_suffixes = ?8,
                    execution_interval_seconds = ?9, use_llm = ?10
                 WHERE id = ?11",
                params![
                    task.task_name,
                    task.base_url,
                    task.source_type,
                    task.tags,
                    task.depth,
                    task.strategy_type,
                    task.strategy_contents,
                    encode_suffixes(&task.exclude_suffixes)?,
                    to_db_int(task.execution_interval_seconds),
                    task.use_llm,
                    id,
                ],
            )
            .map_err(|e| duplicate_name_or(e, &task.task_name))?;

            load_task(conn, id)
        })
        .await
    }

    async fn delete_task(&self, id: i64) -> StorageResult<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "DELETE FROM url_discovery_tasks WHERE id = ?1",
                params![id],
            )?;
            require_task_row(changed, id)
        })
        .await
    }

    async fn set_active(
        &self,
        id: i64,
        is_active: bool,
        next_execution_time: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE url_discovery_tasks
                 SET is_active = ?1, next_execution_time = COALESCE(?2, next_execution_time)
                 WHERE id = ?3",
                params![is_active, next_execution_time.map(format_timestamp), id],
            )?;
            require_task_row(changed, id)
        })
        .await
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> StorageResult<Vec<DiscoveryTask>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM url_discovery_tasks
                 WHERE is_active = 1
                   AND (next_execution_time IS NULL OR next_execution_time <= ?1)
                 ORDER BY id",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map(params![format_timestamp(now)], task_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn touch_last_execution(&self, id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE url_discovery_tasks SET last_execution_time = ?1 WHERE id = ?2",
                params![format_timestamp(at), id],
            )?;
            require_task_row(changed, id)
        })
        .await
    }

    async fn record_execution(
        &self,
        id: i64,
        success_count: u64,
        fail_count: u64,
        next_execution_time: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE url_discovery_tasks
                 SET success_counts = success_counts + ?1,
                     fail_counts = fail_counts + ?2,
                     next_execution_time = ?3
                 WHERE id = ?4",
                params![
                    to_db_int(success_count),
                    to_db_int(fail_count),
                    format_timestamp(next_execution_time),
                    id
                ],
            )?;
            require_task_row(changed, id)
        })
        .await
    }

    async fn reschedule(&self, id: i64, next_execution_time: DateTime<Utc>) -> StorageResult<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE url_discovery_tasks SET next_execution_time = ?1 WHERE id = ?2",
                params![format_timestamp(next_execution_time), id],
            )?;
            require_task_row(changed, id)
        })
        .await
    }
}

#[async_trait]
impl UrlStore for SqliteStore {
    async fn upsert_url(&self, record: &UrlRecord) -> StorageResult<()> {
        let record = record.clone();
        self.with_conn(move |conn| {
            let now = format_timestamp(Utc::now());
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO web_urls (
                    origin, url, url_path, depth, discovered_from, discovery_type,
                    source_type, tags, first_seen_at, last_seen_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                ON CONFLICT(origin, url) DO NOTHING",
                params![
                    record.origin,
                    record.url,
                    record.url_path(),
                    record.depth,
                    record.discovered_from,
                    record.discovery_type.as_str(),
                    record.source_type,
                    record.tags,
                    now,
                ],
            )?;

            tx.execute(
                "UPDATE web_urls SET last_seen_at = MAX(last_seen_at, ?1)
                 WHERE origin = ?2 AND url = ?3",
                params![now, record.origin, record.url],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_url(&self, origin: &str, url: &str) -> StorageResult<Option<StoredUrl>> {
        let (origin, url) = (origin.to_string(), url.to_string());
        self.with_conn(move |conn| {
            let stored = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM web_urls WHERE origin = ?1 AND url = ?2",
                        URL_COLUMNS
                    ),
                    params![origin, url],
                    url_from_row,
                )
                .optional()?;
            Ok(stored)
        })
        .await
    }

    async fn urls_for_source_type(&self, source_type: &str) -> StorageResult<Vec<StoredUrl>> {
        let source_type = source_type.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM web_urls WHERE source_type = ?1 ORDER BY first_seen_at, id",
                URL_COLUMNS
            ))?;
            let urls = stmt
                .query_map(params![source_type], url_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(urls)
        })
        .await
    }

    async fn recent_urls_for_source_type(
        &self,
        source_type: &str,
        window: Duration,
    ) -> StorageResult<Vec<StoredUrl>> {
        let source_type = source_type.to_string();
        let window_secs = window.as_secs_f64();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM web_urls
                 WHERE source_type = ?1
                   AND (julianday(last_seen_at) - julianday(first_seen_at)) * 86400.0 <= ?2
                 ORDER BY first_seen_at, id",
                URL_COLUMNS
            ))?;
            let urls = stmt
                .query_map(params![source_type, window_secs], url_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(urls)
        })
        .await
    }

    async fn audit_candidates(
        &self,
        origin: &str,
        exclude_suffixes: &[String],
    ) -> StorageResult<Vec<String>> {
        let origin = origin.to_string();
        let exclude_suffixes = exclude_suffixes.to_vec();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT url FROM web_urls WHERE origin = ?1 ORDER BY first_seen_at, id")?;
            let urls = stmt
                .query_map(params![origin], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(urls
                .into_iter()
                .filter(|url| !matches_excluded_suffix(url, &exclude_suffixes))
                .collect())
        })
        .await
    }

    async fn start_crawl_run(
        &self,
        origin: &str,
        start_url: &str,
        limits: TraversalLimits,
    ) -> StorageResult<i64> {
        let (origin, start_url) = (origin.to_string(), start_url.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO crawl_runs (origin, start_url, max_depth, max_pages, status, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    origin,
                    start_url,
                    limits.max_depth,
                    to_db_int(limits.max_pages as u64),
                    CrawlRunStatus::Running.to_db_string(),
                    format_timestamp(Utc::now()),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn finish_crawl_run(
        &self,
        id: i64,
        status: CrawlRunStatus,
        total_urls: usize,
    ) -> StorageResult<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE crawl_runs SET status = ?1, total_urls = ?2, finished_at = ?3 WHERE id = ?4",
                params![
                    status.to_db_string(),
                    to_db_int(total_urls as u64),
                    format_timestamp(Utc::now()),
                    id
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::CrawlRunNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn get_crawl_run(&self, id: i64) -> StorageResult<CrawlRun> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM crawl_runs WHERE id = ?1", CRAWL_RUN_COLUMNS),
                params![id],
                crawl_run_from_row,
            )
            .optional()?
            .ok_or(StorageError::CrawlRunNotFound(id))
        })
        .await
    }
}

fn load_task(conn: &Connection, id: i64) -> StorageResult<DiscoveryTask> {
    conn.query_row(
        &format!("SELECT {} FROM url_discovery_tasks WHERE id = ?1", TASK_COLUMNS),
        params![id],
        task_from_row,
    )
    .optional()?
    .ok_or(StorageError::TaskNotFound(id))
}

fn task_id_by_name(conn: &Connection, name: &str) -> StorageResult<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM url_discovery_tasks WHERE task_name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn require_task_row(changed: usize, id: i64) -> StorageResult<()> {
    if changed == 0 {
        return Err(StorageError::TaskNotFound(id));
    }
    Ok(())
}

/// Maps a uniqueness violation on the task name to `DuplicateTaskName`
fn duplicate_name_or(error: rusqlite::Error, name: &str) -> StorageError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::DuplicateTaskName(name.to_string())
        }
        _ => StorageError::Sqlite(error),
    }
}

fn encode_suffixes(suffixes: &[String]) -> StorageResult<String> {
    serde_json::to_string(suffixes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn to_db_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn conversion_error<E>(idx: usize, error: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, error.into())
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn optional_timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(idx)?;
    value
        .map(|value| {
            DateTime::parse_from_rfc3339(&value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| conversion_error(idx, e))
        })
        .transpose()
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<DiscoveryTask> {
    let suffixes: String = row.get(8)?;
    let exclude_suffixes = serde_json::from_str(&suffixes).map_err(|e| conversion_error(8, e))?;

    Ok(DiscoveryTask {
        id: row.get(0)?,
        task_name: row.get(1)?,
        base_url: row.get(2)?,
        source_type: row.get(3)?,
        tags: row.get(4)?,
        depth: row.get(5)?,
        strategy_type: row.get(6)?,
        strategy_contents: row.get(7)?,
        exclude_suffixes,
        execution_interval_seconds: from_db_int(row.get(9)?),
        use_llm: row.get(10)?,
        next_execution_time: optional_timestamp_column(row, 11)?,
        last_execution_time: optional_timestamp_column(row, 12)?,
        is_active: row.get(13)?,
        success_counts: from_db_int(row.get(14)?),
        fail_counts: from_db_int(row.get(15)?),
        create_time: timestamp_column(row, 16)?,
    })
}

fn url_from_row(row: &Row<'_>) -> rusqlite::Result<StoredUrl> {
    let discovery_type: String = row.get(6)?;

    Ok(StoredUrl {
        id: row.get(0)?,
        origin: row.get(1)?,
        url: row.get(2)?,
        url_path: row.get(3)?,
        depth: row.get(4)?,
        discovered_from: row.get(5)?,
        discovery_type: discovery_type
            .parse::<DiscoveryType>()
            .map_err(|e| conversion_error(6, e))?,
        source_type: row.get(7)?,
        tags: row.get(8)?,
        first_seen_at: timestamp_column(row, 9)?,
        last_seen_at: timestamp_column(row, 10)?,
    })
}

fn crawl_run_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlRun> {
    let status: String = row.get(5)?;

    Ok(CrawlRun {
        id: row.get(0)?,
        origin: row.get(1)?,
        start_url: row.get(2)?,
        max_depth: row.get(3)?,
        max_pages: from_db_int(row.get(4)?) as usize,
        status: CrawlRunStatus::from_db_string(&status)
            .ok_or_else(|| conversion_error(5, format!("unknown crawl run status '{}'", status)))?,
        total_urls: from_db_int(row.get(6)?) as usize,
        started_at: timestamp_column(row, 7)?,
        finished_at: optional_timestamp_column(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn new_task(name: &str) -> NewTask {
        NewTask::new(name, "https://a.test/", "sitemap", 600)
    }

    fn record(url: &str) -> UrlRecord {
        UrlRecord {
            origin: "https://a.test".to_string(),
            url: url.to_string(),
            depth: 1,
            discovered_from: Some("https://a.test/".to_string()),
            discovery_type: DiscoveryType::Dom,
            source_type: Some("sitemap".to_string()),
            tags: None,
        }
    }

    #[tokio::test]
    async fn test_create_task() {
        let store = SqliteStore::new_in_memory().unwrap();
        let task = store.create_task(&new_task("docs"), t0()).await.unwrap();

        assert!(task.id > 0);
        assert_eq!(task.task_name, "docs");
        assert!(task.is_active);
        assert_eq!(task.success_counts, 0);
        assert_eq!(task.exclude_suffixes, vec![".js", ".css"]);
        assert_eq!(task.create_time, t0());
        assert_eq!(
            task.next_execution_time,
            Some(t0() + chrono::Duration::seconds(600))
        );
        assert_eq!(task.last_execution_time, None);

        assert_eq!(store.get_task(task.id).await.unwrap(), task);
    }

    #[tokio::test]
    async fn test_duplicate_task_name() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.create_task(&new_task("docs"), t0()).await.unwrap();

        let err = store
            .create_task(&new_task(" docs "), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateTaskName(name) if name == "docs"));
    }

    #[tokio::test]
    async fn test_get_missing_task() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(matches!(
            store.get_task(42).await,
            Err(StorageError::TaskNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_list_tasks_newest_first() {
        let store = SqliteStore::new_in_memory().unwrap();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            store
                .create_task(&new_task(name), t0() + chrono::Duration::minutes(i as i64))
                .await
                .unwrap();
        }

        let names = |tasks: Vec<DiscoveryTask>| {
            tasks
                .into_iter()
                .map(|t| t.task_name)
                .collect::<Vec<_>>()
        };

        assert_eq!(names(store.list_tasks(0, 10).await.unwrap()), vec!["c", "b", "a"]);
        assert_eq!(names(store.list_tasks(1, 1).await.unwrap()), vec!["b"]);
        assert!(store.list_tasks(5, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_task() {
        let store = SqliteStore::new_in_memory().unwrap();
        let task = store.create_task(&new_task("docs"), t0()).await.unwrap();

        let patch = TaskPatch {
            depth: Some(4),
            tags: Some(Some("nightly".to_string())),
            exclude_suffixes: Some(vec![".png".to_string()]),
            ..TaskPatch::default()
        };
        let updated = store.update_task(task.id, &patch).await.unwrap();

        assert_eq!(updated.depth, 4);
        assert_eq!(updated.tags.as_deref(), Some("nightly"));
        assert_eq!(updated.exclude_suffixes, vec![".png"]);
        assert_eq!(updated.task_name, "docs");
        assert_eq!(updated.next_execution_time, task.next_execution_time);
    }

    #[tokio::test]
    async fn test_update_task_name_collision() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.create_task(&new_task("docs"), t0()).await.unwrap();
        let blog = store.create_task(&new_task("blog"), t0()).await.unwrap();

        let rename = TaskPatch {
            task_name: Some("docs".to_string()),
            ..TaskPatch::default()
        };
        assert!(matches!(
            store.update_task(blog.id, &rename).await,
            Err(StorageError::DuplicateTaskName(_))
        ));

        // Renaming to its own name is not a collision
        let same = TaskPatch {
            task_name: Some("blog".to_string()),
            ..TaskPatch::default()
        };
        assert!(store.update_task(blog.id, &same).await.is_ok());

        assert!(matches!(
            store.update_task(999, &same).await,
            Err(StorageError::TaskNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_delete_task() {
        let store = SqliteStore::new_in_memory().unwrap();
        let task = store.create_task(&new_task("docs"), t0()).await.unwrap();

        store.delete_task(task.id).await.unwrap();
        assert!(matches!(
            store.get_task(task.id).await,
            Err(StorageError::TaskNotFound(_))
        ));
        assert!(matches!(
            store.delete_task(task.id).await,
            Err(StorageError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_active_and_due_tasks() {
        let store = SqliteStore::new_in_memory().unwrap();
        let task = store.create_task(&new_task("docs"), t0()).await.unwrap();

        // Not due until one interval has passed
        assert!(store.due_tasks(t0()).await.unwrap().is_empty());
        let later = t0() + chrono::Duration::seconds(600);
        assert_eq!(store.due_tasks(later).await.unwrap().len(), 1);

        // Stopping keeps the schedule but hides the task
        store.set_active(task.id, false, None).await.unwrap();
        let stopped = store.get_task(task.id).await.unwrap();
        assert!(!stopped.is_active);
        assert_eq!(stopped.next_execution_time, task.next_execution_time);
        assert!(store.due_tasks(later).await.unwrap().is_empty());

        // Starting makes it due immediately
        store.set_active(task.id, true, Some(t0())).await.unwrap();
        let due = store.due_tasks(t0()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].next_execution_time, Some(t0()));

        assert!(matches!(
            store.set_active(999, true, None).await,
            Err(StorageError::TaskNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_record_execution_accumulates() {
        let store = SqliteStore::new_in_memory().unwrap();
        let task = store.create_task(&new_task("docs"), t0()).await.unwrap();

        store.touch_last_execution(task.id, t0()).await.unwrap();
        store
            .record_execution(task.id, 3, 1, t0() + chrono::Duration::seconds(600))
            .await
            .unwrap();
        store
            .record_execution(task.id, 2, 2, t0() + chrono::Duration::seconds(1200))
            .await
            .unwrap();

        let task = store.get_task(task.id).await.unwrap();
        assert_eq!(task.success_counts, 5);
        assert_eq!(task.fail_counts, 3);
        assert_eq!(task.last_execution_time, Some(t0()));
        assert_eq!(
            task.next_execution_time,
            Some(t0() + chrono::Duration::seconds(1200))
        );
    }

    #[tokio::test]
    async fn test_reschedule_leaves_counters() {
        let store = SqliteStore::new_in_memory().unwrap();
        let task = store.create_task(&new_task("docs"), t0()).await.unwrap();
        let next = t0() + chrono::Duration::hours(2);

        store.reschedule(task.id, next).await.unwrap();

        let task = store.get_task(task.id).await.unwrap();
        assert_eq!(task.next_execution_time, Some(next));
        assert_eq!(task.success_counts, 0);
        assert_eq!(task.fail_counts, 0);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.upsert_url(&record("https://a.test/x")).await.unwrap();
        let first = store
            .get_url("https://a.test", "https://a.test/x")
            .await
            .unwrap()
            .unwrap();

        let mut again = record("https://a.test/x");
        again.discovery_type = DiscoveryType::Heuristic;
        again.depth = 3;
        store.upsert_url(&again).await.unwrap();

        let second = store
            .get_url("https://a.test", "https://a.test/x")
            .await
            .unwrap()
            .unwrap();

        let rows: i64 = store
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM web_urls", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(second.id, first.id);
        assert_eq!(second.first_seen_at, first.first_seen_at);
        assert!(second.last_seen_at >= first.last_seen_at);
        assert!(second.last_seen_at >= second.first_seen_at);
        assert_eq!(second.discovery_type, DiscoveryType::Dom);
        assert_eq!(second.depth, 1);
        assert_eq!(second.url_path, "/x");
    }

    #[tokio::test]
    async fn test_concurrent_upserts_same_key() {
        let store = SqliteStore::new_in_memory().unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.upsert_url(&record("https://a.test/same")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let urls = store.urls_for_source_type("sitemap").await.unwrap();
        assert_eq!(urls.len(), 1);
    }

    #[tokio::test]
    async fn test_audit_candidates_excludes_suffixes() {
        let store = SqliteStore::new_in_memory().unwrap();
        for url in [
            "https://a.test/",
            "https://a.test/app.js",
            "https://a.test/style.css?v=2",
            "https://a.test/about",
        ] {
            store.upsert_url(&record(url)).await.unwrap();
        }
        let mut other = record("https://b.test/page");
        other.origin = "https://b.test".to_string();
        store.upsert_url(&other).await.unwrap();

        let suffixes = vec![".js".to_string(), ".css".to_string()];
        let candidates = store
            .audit_candidates("https://a.test", &suffixes)
            .await
            .unwrap();
        assert_eq!(candidates, vec!["https://a.test/", "https://a.test/about"]);

        let all = store.audit_candidates("https://a.test", &[]).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_urls_for_source_type() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.upsert_url(&record("https://a.test/one")).await.unwrap();
        let mut key_page = record("https://a.test/two");
        key_page.source_type = Some("key_page".to_string());
        store.upsert_url(&key_page).await.unwrap();

        let sitemap = store.urls_for_source_type("sitemap").await.unwrap();
        assert_eq!(sitemap.len(), 1);
        assert_eq!(sitemap[0].url, "https://a.test/one");
        assert!(store.urls_for_source_type("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_urls_window() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.upsert_url(&record("https://a.test/new")).await.unwrap();
        store.upsert_url(&record("https://a.test/old")).await.unwrap();

        // Make /old look like it was first seen an hour before its last sighting
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE web_urls SET first_seen_at = ?1, last_seen_at = ?2 WHERE url = ?3",
                    params![
                        "2024-03-01T11:00:00.000Z",
                        "2024-03-01T12:00:00.000Z",
                        "https://a.test/old"
                    ],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let recent = store
            .recent_urls_for_source_type("sitemap", Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].url, "https://a.test/new");

        let wide = store
            .recent_urls_for_source_type("sitemap", Duration::from_secs(7200))
            .await
            .unwrap();
        assert_eq!(wide.len(), 2);
    }

    #[tokio::test]
    async fn test_crawl_run_lifecycle() {
        let store = SqliteStore::new_in_memory().unwrap();
        let id = store
            .start_crawl_run("https://a.test", "https://a.test/", TraversalLimits::new(2, 50))
            .await
            .unwrap();

        let run = store.get_crawl_run(id).await.unwrap();
        assert_eq!(run.status, CrawlRunStatus::Running);
        assert_eq!(run.max_pages, 50);
        assert!(run.finished_at.is_none());

        store
            .finish_crawl_run(id, CrawlRunStatus::Completed, 12)
            .await
            .unwrap();
        let run = store.get_crawl_run(id).await.unwrap();
        assert_eq!(run.status, CrawlRunStatus::Completed);
        assert_eq!(run.total_urls, 12);
        assert!(run.finished_at.is_some());

        assert!(matches!(
            store.get_crawl_run(id + 1).await,
            Err(StorageError::CrawlRunNotFound(_))
        ));
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.db");
        assert!(SqliteStore::new(&path).is_ok());
        // Reopening runs the idempotent schema again
        assert!(SqliteStore::new(&path).is_ok());
    }
}
