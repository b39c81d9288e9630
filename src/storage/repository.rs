//! Repository Pattern for the video record store
//!
//! This module provides the trait-based store the pipeline writes through,
//! decoupling ingestion and announcement from the storage backend:
//! - Easy testing with the in-memory implementation
//! - Swappable storage backends
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │          IngestionCoordinator / AnnouncementEngine          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     VideoRepository                         │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                       │
//!                    ▼                       ▼
//!          ┌─────────────────┐     ┌─────────────────┐
//!          │     SQLite      │     │    In-memory    │
//!          └─────────────────┘     └─────────────────┘
//! ```
//!
//! Both implementations make the per-record write paths atomic: batch
//! upserts are all-or-nothing and the announce transition is a conditional
//! write that never replaces an existing `announced_at`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::clock::{format_timestamp, parse_timestamp, Clock};
use crate::models::VideoRecord;
use crate::utils::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Core Types
// ============================================================================

/// Outcome of a batch upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Identities seen for the first time
    pub inserted: usize,
    /// Identities that already existed
    pub updated: usize,
}

impl UpsertSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Durable store of video records keyed by content identity
pub trait VideoRepository: Send + Sync {
    /// Point lookup; `None` means the identity has never been seen
    fn find_by_content_id(&self, content_id: &str) -> StoreResult<Option<VideoRecord>>;

    /// Records published at or after `since`, ascending by start time
    fn find_recent(&self, since: DateTime<FixedOffset>) -> StoreResult<Vec<VideoRecord>>;

    /// Write a batch atomically.
    ///
    /// Existing identities keep their `announced_at` and `start_time`; title
    /// and metrics are overwritten. Every written record gets
    /// `last_updated_at = max(previous, now)`.
    fn upsert_batch(&self, records: &[VideoRecord]) -> StoreResult<UpsertSummary>;

    /// Set `announced_at` if and only if it is currently absent.
    ///
    /// Fails with [`StoreError::AlreadyAnnounced`] when it is already set and
    /// with [`StoreError::NotFound`] for unknown identities.
    fn mark_announced(&self, content_id: &str, at: DateTime<FixedOffset>) -> StoreResult<()>;

    /// Number of stored records
    fn count(&self) -> StoreResult<usize>;
}

/// Thread-safe shared repository wrapper
pub type SharedVideoRepository = Arc<dyn VideoRepository>;

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of VideoRepository
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteVideoRepository {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteVideoRepository {
    /// Open (or create) the database at `path`
    pub fn new(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets the trigger server read while a CLI run writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let repo = Self {
            conn: Mutex::new(conn),
            clock,
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite video store initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory(clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Mutex::new(conn),
            clock,
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn create_schema(&self) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS videos (
                    content_id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    view_count INTEGER NOT NULL DEFAULT 0,
                    comment_count INTEGER NOT NULL DEFAULT 0,
                    mylist_count INTEGER NOT NULL DEFAULT 0,
                    start_time TEXT NOT NULL,
                    announced_at TEXT,
                    last_updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_videos_start_time
                    ON videos(start_time);
                "#,
        )?;

        Ok(())
    }
}

/// Raw column values, converted outside the rusqlite row callback
struct VideoRow {
    content_id: String,
    title: String,
    view_count: i64,
    comment_count: i64,
    mylist_count: i64,
    start_time: String,
    announced_at: Option<String>,
    last_updated_at: String,
}

const SELECT_COLUMNS: &str = "content_id, title, view_count, comment_count, mylist_count, \
     start_time, announced_at, last_updated_at";

impl VideoRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            content_id: row.get(0)?,
            title: row.get(1)?,
            view_count: row.get(2)?,
            comment_count: row.get(3)?,
            mylist_count: row.get(4)?,
            start_time: row.get(5)?,
            announced_at: row.get(6)?,
            last_updated_at: row.get(7)?,
        })
    }

    fn into_record(self) -> StoreResult<VideoRecord> {
        let announced_at = match self.announced_at {
            Some(value) => Some(read_timestamp("announced_at", value)?),
            None => None,
        };

        Ok(VideoRecord {
            content_id: self.content_id,
            title: self.title,
            view_count: self.view_count.max(0) as u64,
            comment_count: self.comment_count.max(0) as u64,
            mylist_count: self.mylist_count.max(0) as u64,
            start_time: read_timestamp("start_time", self.start_time)?,
            announced_at,
            last_updated_at: read_timestamp("last_updated_at", self.last_updated_at)?,
        })
    }
}

fn read_timestamp(column: &'static str, value: String) -> StoreResult<DateTime<FixedOffset>> {
    parse_timestamp(&value).ok_or(StoreError::InvalidTimestamp { column, value })
}

fn count_to_sql(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl VideoRepository for SqliteVideoRepository {
    fn find_by_content_id(&self, content_id: &str) -> StoreResult<Option<VideoRecord>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM videos WHERE content_id = ?1"),
                params![content_id],
                VideoRow::from_row,
            )
            .optional()?;

        row.map(VideoRow::into_record).transpose()
    }

    fn find_recent(&self, since: DateTime<FixedOffset>) -> StoreResult<Vec<VideoRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM videos
             WHERE start_time >= ?1
             ORDER BY start_time ASC, content_id ASC"
        ))?;

        let rows = stmt
            .query_map(params![format_timestamp(&since)], VideoRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(VideoRow::into_record).collect()
    }

    fn upsert_batch(&self, records: &[VideoRecord]) -> StoreResult<UpsertSummary> {
        if records.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let now = format_timestamp(&self.clock.now());
        let mut conn = self.lock();
        // IMMEDIATE: a deferred read-then-write cannot upgrade after another
        // connection commits, and busy_timeout does not cover that
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut summary = UpsertSummary::default();

        {
            let mut exists_stmt =
                tx.prepare_cached("SELECT EXISTS(SELECT 1 FROM videos WHERE content_id = ?1)")?;
            let mut upsert_stmt = tx.prepare_cached(
                r#"
                INSERT INTO videos (content_id, title, view_count, comment_count, mylist_count,
                                    start_time, announced_at, last_updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(content_id) DO UPDATE SET
                    title = excluded.title,
                    view_count = excluded.view_count,
                    comment_count = excluded.comment_count,
                    mylist_count = excluded.mylist_count,
                    announced_at = COALESCE(videos.announced_at, excluded.announced_at),
                    last_updated_at = MAX(videos.last_updated_at, excluded.last_updated_at)
                "#,
            )?;

            for record in records {
                let exists: bool =
                    exists_stmt.query_row(params![record.content_id], |row| row.get(0))?;

                upsert_stmt.execute(params![
                    record.content_id,
                    record.title,
                    count_to_sql(record.view_count),
                    count_to_sql(record.comment_count),
                    count_to_sql(record.mylist_count),
                    format_timestamp(&record.start_time),
                    record.announced_at.as_ref().map(format_timestamp),
                    now,
                ])?;

                if exists {
                    summary.updated += 1;
                } else {
                    summary.inserted += 1;
                }
            }
        }

        tx.commit()?;
        Ok(summary)
    }

    fn mark_announced(&self, content_id: &str, at: DateTime<FixedOffset>) -> StoreResult<()> {
        let at = format_timestamp(&at);
        let conn = self.lock();

        let changed = conn.execute(
            r#"
            UPDATE videos
            SET announced_at = ?2,
                last_updated_at = MAX(last_updated_at, ?2)
            WHERE content_id = ?1 AND announced_at IS NULL
            "#,
            params![content_id, at],
        )?;

        if changed == 1 {
            return Ok(());
        }

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM videos WHERE content_id = ?1)",
            params![content_id],
            |row| row.get(0),
        )?;

        if exists {
            Err(StoreError::AlreadyAnnounced(content_id.to_string()))
        } else {
            Err(StoreError::NotFound(content_id.to_string()))
        }
    }

    fn count(&self) -> StoreResult<usize> {
        let conn = self.lock();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?;
        Ok(total.max(0) as usize)
    }
}

// ============================================================================
// In-memory Implementation
// ============================================================================

/// In-memory implementation of VideoRepository
///
/// Same semantics as the SQLite store, without durability. Useful for
/// tests and dry runs.
pub struct MemoryVideoRepository {
    records: RwLock<HashMap<String, VideoRecord>>,
    clock: Arc<dyn Clock>,
}

impl MemoryVideoRepository {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Get the number of records
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, VideoRecord>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, VideoRecord>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl VideoRepository for MemoryVideoRepository {
    fn find_by_content_id(&self, content_id: &str) -> StoreResult<Option<VideoRecord>> {
        Ok(self.read().get(content_id).cloned())
    }

    fn find_recent(&self, since: DateTime<FixedOffset>) -> StoreResult<Vec<VideoRecord>> {
        let mut recent: Vec<VideoRecord> = self
            .read()
            .values()
            .filter(|r| r.start_time >= since)
            .cloned()
            .collect();

        recent.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        Ok(recent)
    }

    fn upsert_batch(&self, records: &[VideoRecord]) -> StoreResult<UpsertSummary> {
        let now = self.clock.now();
        let mut stored = self.write();
        let mut summary = UpsertSummary::default();

        for record in records {
            match stored.get_mut(&record.content_id) {
                Some(existing) => {
                    existing.title = record.title.clone();
                    existing.view_count = record.view_count;
                    existing.comment_count = record.comment_count;
                    existing.mylist_count = record.mylist_count;
                    existing.announced_at = existing.announced_at.or(record.announced_at);
                    existing.last_updated_at = existing.last_updated_at.max(now);
                    summary.updated += 1;
                }
                None => {
                    let mut fresh = record.clone();
                    fresh.last_updated_at = now;
                    stored.insert(fresh.content_id.clone(), fresh);
                    summary.inserted += 1;
                }
            }
        }

        Ok(summary)
    }

    fn mark_announced(&self, content_id: &str, at: DateTime<FixedOffset>) -> StoreResult<()> {
        let mut stored = self.write();
        let record = stored
            .get_mut(content_id)
            .ok_or_else(|| StoreError::NotFound(content_id.to_string()))?;

        if record.announced_at.is_some() {
            return Err(StoreError::AlreadyAnnounced(content_id.to_string()));
        }

        record.announced_at = Some(at);
        record.last_updated_at = record.last_updated_at.max(at);
        Ok(())
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.len())
    }
}

// ============================================================================
// Shared Repository Constructors
// ============================================================================

/// Create a shared SQLite repository
pub fn create_sqlite_repository(
    path: impl AsRef<Path>,
    clock: Arc<dyn Clock>,
) -> StoreResult<SharedVideoRepository> {
    Ok(Arc::new(SqliteVideoRepository::new(path, clock)?))
}

/// Create a shared in-memory repository
pub fn create_memory_repository(clock: Arc<dyn Clock>) -> SharedVideoRepository {
    Arc::new(MemoryVideoRepository::new(clock))
}

// ============================================================================
// Tests
// ============================================================================
