use std::pin::Pin;

use fsal_core::{FsEntry, FsalError};
use rusqlite::params_from_iter;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_rusqlite::Connection;

use crate::row::row_from_sqlite;

pub type EntryStream = Pin<Box<dyn Stream<Item = Result<FsEntry, FsalError>> + Send>>;

const CHANNEL_CAPACITY: usize = 256;
const PAGE_SIZE: i64 = 500;

/// Runs `query_fn(offset)` repeatedly, each call producing one page's SQL
/// and bind parameters, until a page comes back short of a full page. Rows
/// are pushed onto a bounded channel as they're read, so the whole result
/// set is never materialized at once.
pub fn paged_stream(
    conn: Connection,
    query_fn: impl Fn(i64) -> (String, Vec<String>) + Send + 'static,
) -> EntryStream {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut offset: i64 = 0;
        loop {
            let (sql, binds) = query_fn(offset);
            let sql_clone = sql.clone();
            let binds_clone = binds.clone();
            let page: Result<Vec<FsEntry>, tokio_rusqlite::Error> = conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&sql_clone)?;
                    let rows = stmt
                        .query_map(params_from_iter(binds_clone.iter()), row_from_sqlite)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows)
                })
                .await;

            let rows = match page {
                Ok(rows) => rows,
                Err(err) => {
                    let _ = tx.send(Err(FsalError::Store(err.to_string()))).await;
                    return;
                }
            };

            let page_len = rows.len() as i64;
            for row in rows {
                if tx.send(Ok(row)).await.is_err() {
                    return;
                }
            }

            if page_len < PAGE_SIZE {
                return;
            }
            offset += PAGE_SIZE;
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Streams rows whose path is in `paths`, issuing one `IN (...)` query per
/// chunk of at most [`crate::MAX_BATCH`] paths so a single query never binds
/// more parameters than SQLite allows.
pub fn batched_in_stream(conn: Connection, base_path: String, paths: Vec<String>) -> EntryStream {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        for chunk in paths.chunks(crate::MAX_BATCH) {
            let chunk = chunk.to_vec();
            let base_path = base_path.clone();
            let placeholders = std::iter::repeat("?").take(chunk.len()).collect::<Vec<_>>().join(", ");
            let sql = format!(
                "SELECT id, parent_id, type, name, size, create_time, modify_time, path, base_path
                 FROM fsentries WHERE base_path = ? AND path IN ({placeholders})"
            );

            let page: Result<Vec<FsEntry>, tokio_rusqlite::Error> = conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&sql)?;
                    let mut binds: Vec<String> = vec![base_path];
                    binds.extend(chunk);
                    let rows = stmt
                        .query_map(params_from_iter(binds.iter()), row_from_sqlite)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows)
                })
                .await;

            match page {
                Ok(rows) => {
                    for row in rows {
                        if tx.send(Ok(row)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(FsalError::Store(err.to_string()))).await;
                    return;
                }
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
