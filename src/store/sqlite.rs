//! SQLite-backed interaction log.
//!
//! Two tables: `interactions` (one row per attempted reply) and
//! `performance_metrics` (one row per completed cycle). Calls hop onto the
//! blocking pool so a slow disk never stalls the scheduler's runtime threads.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::LogStore;
use crate::error::StorageError;
use crate::types::{CycleMetrics, InteractionRecord};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS interactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    subreddit TEXT NOT NULL,
    post_id TEXT NOT NULL,
    post_title TEXT NOT NULL,
    post_content TEXT NOT NULL,
    keywords_found TEXT NOT NULL,
    bot_response TEXT NOT NULL,
    response_length INTEGER NOT NULL,
    success INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS performance_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    total_posts_scanned INTEGER NOT NULL,
    posts_responded_to INTEGER NOT NULL,
    response_rate REAL NOT NULL,
    average_response_time REAL NOT NULL
);
";

#[derive(Clone)]
pub struct SqliteLogStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLogStore").finish_non_exhaustive()
    }
}

impl SqliteLogStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StorageError::Poisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Keywords are stored as a JSON array. Rows written before that used a
/// ", "-joined list, which is still read back.
fn decode_keywords(s: &str) -> Vec<String> {
    if let Ok(list) = serde_json::from_str::<Vec<String>>(s) {
        return list;
    }
    s.split(", ")
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

const SELECT_INTERACTIONS: &str = r"
    SELECT timestamp, subreddit, post_id, post_title, post_content,
           keywords_found, bot_response, response_length, success
    FROM interactions
";

fn interaction_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InteractionRecord> {
    let ts: String = row.get(0)?;
    let keywords: String = row.get(5)?;
    let len: i64 = row.get(7)?;
    Ok(InteractionRecord {
        timestamp: parse_ts(&ts),
        source_channel: row.get(1)?,
        item_id: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        matched_keywords: decode_keywords(&keywords),
        generated_response: row.get(6)?,
        response_length: len.max(0) as usize,
        success: row.get(8)?,
    })
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn append(&self, record: &InteractionRecord) -> Result<(), StorageError> {
        let r = record.clone();
        let keywords = serde_json::to_string(&r.matched_keywords)?;
        self.with_conn(move |conn| {
            conn.execute(
                r"
                INSERT INTO interactions
                (timestamp, subreddit, post_id, post_title, post_content,
                 keywords_found, bot_response, response_length, success)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
                params![
                    r.timestamp.to_rfc3339(),
                    r.source_channel,
                    r.item_id,
                    r.title,
                    r.body,
                    keywords,
                    r.generated_response,
                    r.response_length as i64,
                    r.success,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn query_all(&self) -> Result<Vec<InteractionRecord>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_INTERACTIONS} ORDER BY id ASC"))?;
            let rows = stmt.query_map([], interaction_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<InteractionRecord>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_INTERACTIONS} ORDER BY id DESC LIMIT ?1"))?;
            let rows = stmt.query_map(params![limit], interaction_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM interactions", [])?;
            tx.execute("DELETE FROM performance_metrics", [])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn append_metrics(&self, metrics: &CycleMetrics) -> Result<(), StorageError> {
        let m = metrics.clone();
        self.with_conn(move |conn| {
            conn.execute(
                r"
                INSERT INTO performance_metrics
                (timestamp, total_posts_scanned, posts_responded_to,
                 response_rate, average_response_time)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
                params![
                    m.timestamp.to_rfc3339(),
                    m.total_posts_scanned as i64,
                    m.posts_responded_to as i64,
                    m.response_rate,
                    m.average_response_time_secs,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn query_metrics(&self) -> Result<Vec<CycleMetrics>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT timestamp, total_posts_scanned, posts_responded_to,
                       response_rate, average_response_time
                FROM performance_metrics
                ORDER BY id ASC
                ",
            )?;
            let rows = stmt.query_map([], |row| {
                let ts: String = row.get(0)?;
                let scanned: i64 = row.get(1)?;
                let responded: i64 = row.get(2)?;
                Ok(CycleMetrics {
                    timestamp: parse_ts(&ts),
                    total_posts_scanned: scanned.max(0) as u64,
                    posts_responded_to: responded.max(0) as u64,
                    response_rate: row.get(3)?,
                    average_response_time_secs: row.get(4)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }
}
