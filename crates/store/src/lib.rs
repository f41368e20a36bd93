//! SQLite-backed catalog store adapter (component C2).
//!
//! All access to the single `fsentries` table goes through a dedicated
//! connection — `tokio_rusqlite::Connection` already serializes calls onto
//! one background thread, which is exactly the single-writer discipline the
//! rest of the daemon relies on (see the task scheduler, C5). Every query
//! that can return an unbounded number of rows pages through the cursor in
//! fixed-size chunks and is exposed as a `Stream`, so callers never
//! materialize a full result set in memory.

mod filter;
mod row;
mod schema;
mod search;
mod stream;

pub use filter::{escape_like, DescendantFilter, Order};
pub use row::row_from_sqlite;
pub use search::SearchQuery;
pub use stream::EntryStream;

use std::path::Path;

use fsal_core::{EntryType, FsEntry, FsalError};
use rusqlite::{params, params_from_iter, OptionalExtension};
use tokio_rusqlite::Connection;

/// Maximum number of bind parameters batched into a single `IN (...)` query,
/// per spec (`select_paths_in`, `filter`).
pub const MAX_BATCH: usize = 999;

/// Rows are paged through in chunks of this size for streaming queries.
const PAGE_SIZE: i64 = 500;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if necessary) the catalog database at `db_path` and
    /// ensures the schema exists.
    pub async fn open(db_path: &Path) -> Result<Self, FsalError> {
        let conn = Connection::open(db_path)
            .await
            .map_err(|e| FsalError::Store(e.to_string()))?;
        conn.call(|conn| {
            conn.execute_batch(schema::SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))?;
        Ok(Self { conn })
    }

    /// In-memory catalog, primarily for tests.
    pub async fn open_in_memory() -> Result<Self, FsalError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| FsalError::Store(e.to_string()))?;
        conn.call(|conn| {
            conn.execute_batch(schema::SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))?;
        Ok(Self { conn })
    }

    pub async fn insert(&self, entry: &FsEntry) -> Result<i64, FsalError> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO fsentries
                        (parent_id, type, name, size, create_time, modify_time, path, base_path)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        entry.parent_id,
                        entry.entry_type.as_i64(),
                        entry.name,
                        entry.size as i64,
                        entry.create_time,
                        entry.modify_time,
                        entry.path,
                        entry.base_path,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    pub async fn update(&self, id: i64, entry: &FsEntry) -> Result<(), FsalError> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE fsentries SET
                        parent_id = ?1, type = ?2, name = ?3, size = ?4,
                        create_time = ?5, modify_time = ?6
                     WHERE id = ?7",
                    params![
                        entry.parent_id,
                        entry.entry_type.as_i64(),
                        entry.name,
                        entry.size as i64,
                        entry.create_time,
                        entry.modify_time,
                        id,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    /// Update-if-exists-else-insert, keyed on `(base_path, path)`. Returns
    /// the row id.
    pub async fn upsert(&self, entry: &FsEntry) -> Result<i64, FsalError> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| {
                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM fsentries WHERE base_path = ?1 AND path = ?2",
                        params![entry.base_path, entry.path],
                        |row| row.get(0),
                    )
                    .optional()?;

                if let Some(id) = existing {
                    conn.execute(
                        "UPDATE fsentries SET
                            parent_id = ?1, type = ?2, name = ?3, size = ?4,
                            create_time = ?5, modify_time = ?6
                         WHERE id = ?7",
                        params![
                            entry.parent_id,
                            entry.entry_type.as_i64(),
                            entry.name,
                            entry.size as i64,
                            entry.create_time,
                            entry.modify_time,
                            id,
                        ],
                    )?;
                    Ok(id)
                } else {
                    conn.execute(
                        "INSERT INTO fsentries
                            (parent_id, type, name, size, create_time, modify_time, path, base_path)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            entry.parent_id,
                            entry.entry_type.as_i64(),
                            entry.name,
                            entry.size as i64,
                            entry.create_time,
                            entry.modify_time,
                            entry.path,
                            entry.base_path,
                        ],
                    )?;
                    Ok(conn.last_insert_rowid())
                }
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    pub async fn delete_where_path_equals(
        &self,
        base_path: &str,
        path: &str,
    ) -> Result<u64, FsalError> {
        let base_path = base_path.to_string();
        let path = path.to_string();
        self.conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM fsentries WHERE base_path = ?1 AND path = ?2",
                    params![base_path, path],
                )?;
                Ok(n as u64)
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    /// Deletes rows whose path matches a `LIKE` pattern (`%`/`_` with `\`
    /// as the escape character), scoped to `base_path`.
    pub async fn delete_where_path_like(
        &self,
        base_path: &str,
        like_pattern: &str,
    ) -> Result<u64, FsalError> {
        let base_path = base_path.to_string();
        let like_pattern = like_pattern.to_string();
        self.conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM fsentries WHERE base_path = ?1 AND path LIKE ?2 ESCAPE '\\'",
                    params![base_path, like_pattern],
                )?;
                Ok(n as u64)
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    /// Deletes rows by id, batching the `IN (...)` query to at most
    /// [`MAX_BATCH`] ids per round trip (the prune pass's "1000 per batch"
    /// requirement, reconciled against SQLite's bind-parameter ceiling).
    pub async fn delete_where_id_in(&self, ids: &[i64]) -> Result<u64, FsalError> {
        let mut total = 0u64;
        for chunk in ids.chunks(MAX_BATCH) {
            let chunk = chunk.to_vec();
            total += self
                .conn
                .call(move |conn| {
                    let placeholders = std::iter::repeat("?").take(chunk.len()).collect::<Vec<_>>().join(", ");
                    let sql = format!("DELETE FROM fsentries WHERE id IN ({placeholders})");
                    let n = conn.execute(&sql, params_from_iter(chunk.iter()))?;
                    Ok(n as u64)
                })
                .await
                .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))?;
        }
        Ok(total)
    }

    pub async fn select_children(&self, parent_id: i64) -> Result<Vec<FsEntry>, FsalError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, parent_id, type, name, size, create_time, modify_time, path, base_path
                     FROM fsentries WHERE parent_id = ?1 ORDER BY name",
                )?;
                let rows = stmt
                    .query_map(params![parent_id], row_from_sqlite)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    /// Looks up a row by relative path, searching the given bases in order
    /// and returning the first match.
    pub async fn select_where_path_eq(
        &self,
        bases: &[String],
        path: &str,
    ) -> Result<Option<FsEntry>, FsalError> {
        let bases = bases.to_vec();
        let path = path.to_string();
        self.conn
            .call(move |conn| {
                for base in &bases {
                    let found: Option<FsEntry> = conn
                        .query_row(
                            "SELECT id, parent_id, type, name, size, create_time, modify_time, path, base_path
                             FROM fsentries WHERE base_path = ?1 AND path = ?2",
                            params![base, path],
                            row_from_sqlite,
                        )
                        .optional()?;
                    if found.is_some() {
                        return Ok(found);
                    }
                }
                Ok(None)
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    /// Streams every row matching `filter`, paging through the cursor in
    /// fixed-size chunks.
    pub fn select_descendants(&self, filter: DescendantFilter) -> EntryStream {
        stream::paged_stream(self.conn.clone(), move |offset| {
            let (sql, binds) = filter.to_sql(PAGE_SIZE, offset);
            (sql, binds)
        })
    }

    /// Counts rows matching `filter` without streaming them.
    pub async fn count_descendants(&self, filter: DescendantFilter) -> Result<u64, FsalError> {
        let (sql, binds) = filter.to_count_sql();
        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    /// Streams rows whose path is in `paths`, batching the `IN (...)` query
    /// to at most [`MAX_BATCH`] entries per round trip.
    pub fn select_paths_in(&self, base_path: String, paths: Vec<String>) -> EntryStream {
        stream::batched_in_stream(self.conn.clone(), base_path, paths)
    }

    /// Transactionally re-homes every row under `old_bases` whose path is in
    /// `path_set` to `new_base`, so subsequent reads observe the new home
    /// immediately (used by consolidate).
    pub async fn bulk_update_base_path(
        &self,
        old_bases: Vec<String>,
        new_base: String,
        path_set: Vec<String>,
    ) -> Result<u64, FsalError> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut updated = 0u64;
                {
                    let mut stmt = tx.prepare(
                        "UPDATE fsentries SET base_path = ?1 WHERE base_path = ?2 AND path = ?3",
                    )?;
                    for old_base in &old_bases {
                        for path in &path_set {
                            updated += stmt.execute(params![new_base, old_base, path])? as u64;
                        }
                    }
                }
                tx.commit()?;
                Ok(updated)
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    /// Runs `f` inside a single SQLite transaction, committing on success
    /// and rolling back if it returns an error.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, FsalError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let result = f(&tx)?;
                tx.commit()?;
                Ok(result)
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    /// Total row count, used by prune to decide how much work remains.
    pub async fn total_rows(&self) -> Result<u64, FsalError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM fsentries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(|e: tokio_rusqlite::Error| FsalError::Store(e.to_string()))
    }

    /// Streams rows matching a name-token search (see [`SearchQuery`]).
    pub fn search(&self, query: SearchQuery) -> EntryStream {
        stream::paged_stream(self.conn.clone(), move |offset| query.to_sql(PAGE_SIZE, offset))
    }

    /// Streams every row in the catalog unconditionally (used by prune).
    pub fn select_all(&self) -> EntryStream {
        stream::paged_stream(self.conn.clone(), |offset| {
            (
                "SELECT id, parent_id, type, name, size, create_time, modify_time, path, base_path
                 FROM fsentries ORDER BY id LIMIT ? OFFSET ?"
                    .to_string(),
                vec![PAGE_SIZE.to_string(), offset.to_string()],
            )
        })
    }
}
