use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Result as SqlResult, params};

use crate::error::StoreError;

use super::ordered_set::{Order, OrderedStore, ScoreRange};

pub const DEFAULT_DATABASE_PATH: &str = "data/history.db";

/// How long a writer waits on another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// VM instructions between checks for an abandoned call.
const PROGRESS_OPS: i32 = 64;

/// Sorted sets persisted in SQLite.
///
/// One row per (key, member). Members compare with SQLite's BINARY collation,
/// which matches byte-wise ordering of UTF-8 strings.
#[derive(Clone)]
pub struct SqliteOrderedSet {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOrderedSet {
    /// Open the store at `path`, creating the schema if needed
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of members stored under `key`.
    pub async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let key = key.to_string();
        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM ordered_sets WHERE set_key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// Dropping the returned future abandons the call: a worker still waiting
    /// for the connection gives up without running `f`, and a statement in
    /// progress is interrupted, rolling back its transaction.
    async fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> SqlResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let abandoned = Arc::new(AtomicBool::new(false));
        let _abandon_on_drop = AbandonOnDrop(Arc::clone(&abandoned));

        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            if abandoned.load(Ordering::SeqCst) {
                return Err(StoreError::Abandoned);
            }

            let flag = Arc::clone(&abandoned);
            guard.progress_handler(PROGRESS_OPS, Some(move || flag.load(Ordering::SeqCst)));
            let result = f(&*guard);
            guard.progress_handler(PROGRESS_OPS, None::<fn() -> bool>);

            match result {
                Err(_) if abandoned.load(Ordering::SeqCst) => Err(StoreError::Abandoned),
                other => other.map_err(StoreError::from),
            }
        })
        .await?
    }
}

/// Marks a connection call abandoned once its caller stops waiting.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn init_schema(conn: &Connection) -> SqlResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ordered_sets (
            set_key TEXT NOT NULL,
            member TEXT NOT NULL,
            score INTEGER NOT NULL,
            PRIMARY KEY (set_key, member)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ordered_sets_score
         ON ordered_sets(set_key, score, member)",
        [],
    )?;

    Ok(())
}

fn insert_member(conn: &Connection, key: &str, score: i64, member: &str) -> SqlResult<bool> {
    // Giống ZADD: member đã có thì chỉ cập nhật score
    let tx = conn.unchecked_transaction()?;

    let existing: Option<i64> = tx
        .query_row(
            "SELECT score FROM ordered_sets WHERE set_key = ?1 AND member = ?2",
            params![key, member],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(current) if current == score => {}
        Some(_) => {
            tx.execute(
                "UPDATE ordered_sets SET score = ?3 WHERE set_key = ?1 AND member = ?2",
                params![key, member, score],
            )?;
        }
        None => {
            tx.execute(
                "INSERT INTO ordered_sets (set_key, member, score) VALUES (?1, ?2, ?3)",
                params![key, member, score],
            )?;
        }
    }

    tx.commit()?;
    Ok(existing.is_none())
}

fn range_members(
    conn: &Connection,
    key: &str,
    range: ScoreRange,
    order: Order,
    limit: usize,
) -> SqlResult<Vec<String>> {
    let sql = match order {
        Order::Ascending => {
            "SELECT member FROM ordered_sets
             WHERE set_key = ?1 AND score >= ?2 AND score <= ?3
             ORDER BY score ASC, member ASC
             LIMIT ?4"
        }
        Order::Descending => {
            "SELECT member FROM ordered_sets
             WHERE set_key = ?1 AND score >= ?2 AND score <= ?3
             ORDER BY score DESC, member DESC
             LIMIT ?4"
        }
    };
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let mut stmt = conn.prepare_cached(sql)?;
    let members = stmt
        .query_map(params![key, range.min, range.max, limit], |row| row.get(0))?
        .collect::<SqlResult<Vec<String>>>()?;

    Ok(members)
}

#[async_trait]
impl OrderedStore for SqliteOrderedSet {
    async fn ordered_insert(&self, key: &str, score: i64, member: &str) -> Result<bool, StoreError> {
        let key = key.to_string();
        let member = member.to_string();
        self.with_connection(move |conn| insert_member(conn, &key, score, &member))
            .await
    }

    async fn ordered_range_by_score(
        &self,
        key: &str,
        range: ScoreRange,
        order: Order,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let key = key.to_string();
        self.with_connection(move |conn| range_members(conn, &key, range, order, limit))
            .await
    }
}
