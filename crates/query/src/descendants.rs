use fsal_core::{EntryType, FsalError};
use fsal_store::{DescendantFilter, EntryStream, Order};
use futures::stream::{self, StreamExt as FuturesStreamExt};

use crate::QueryEngine;

/// Parameters for `LIST_DESCENDANTS`.
#[derive(Debug, Clone)]
pub struct DescendantQuery {
    /// `.` means the whole tree (every configured base); otherwise an
    /// indexed directory path.
    pub path: String,
    /// When true, return a row count instead of streaming rows.
    pub count: bool,
    pub offset: u64,
    pub limit: Option<u64>,
    pub order: Order,
    /// Restrict to rows modified within the last `span` days.
    pub span_days: Option<i64>,
    pub entry_type: Option<EntryType>,
    pub ignored_paths: Vec<String>,
}

impl DescendantQuery {
    pub fn whole_tree() -> Self {
        Self {
            path: ".".to_string(),
            count: false,
            offset: 0,
            limit: None,
            order: Order::PathAsc,
            span_days: None,
            entry_type: None,
            ignored_paths: Vec::new(),
        }
    }
}

pub enum DescendantsResult {
    /// `path` did not resolve to a known, indexed directory.
    NotFound,
    /// `(true, N, [])`: the row count, without streaming rows.
    Count(u64),
    /// `(true, None, stream)`: the matching rows, lazily.
    Entries(EntryStream),
}

/// Resolves `query.path` to one base (a specific directory) or all bases
/// (the whole tree), builds a [`DescendantFilter`] per base honoring the
/// current whitelist snapshot, and either counts or streams the union.
pub async fn run(engine: &QueryEngine, query: DescendantQuery) -> Result<DescendantsResult, FsalError> {
    let whitelist = engine.whitelist().snapshot().await;

    let (scoped_bases, path_prefix) = if query.path == "." {
        (engine.base_strs(), String::new())
    } else {
        match engine.get_fso(&query.path).await? {
            Some(dir) if dir.entry_type.is_dir() => (vec![dir.base_path.clone()], dir.path),
            _ => return Ok(DescendantsResult::NotFound),
        }
    };

    let modified_after = query.span_days.map(|days| now_unix_seconds() - days.max(0) * 86_400);

    let filters: Vec<DescendantFilter> = scoped_bases
        .into_iter()
        .map(|base| {
            let mut filter = DescendantFilter::new(base);
            filter.path_prefix = path_prefix.clone();
            filter.entry_type = query.entry_type;
            filter.modified_after = modified_after;
            filter.ignored_paths = query.ignored_paths.clone();
            filter.whitelist = whitelist.prefixes().to_vec();
            filter.order = query.order;
            filter
        })
        .collect();

    if query.count {
        let mut total = 0u64;
        for filter in filters {
            total += engine.store.count_descendants(filter).await?;
        }
        return Ok(DescendantsResult::Count(total));
    }

    let per_base_streams: Vec<EntryStream> = filters
        .into_iter()
        .map(|filter| engine.store.select_descendants(filter))
        .collect();
    let merged: EntryStream = Box::pin(stream::iter(per_base_streams).flatten());
    let skipped: EntryStream = Box::pin(merged.skip(query.offset as usize));
    let bounded: EntryStream = match query.limit {
        Some(limit) => Box::pin(skipped.take(limit as usize)),
        None => skipped,
    };

    Ok(DescendantsResult::Entries(bounded))
}

fn now_unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
