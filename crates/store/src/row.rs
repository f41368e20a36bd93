use fsal_core::{EntryType, FsEntry};

/// Maps one `fsentries` row onto [`FsEntry`]. Shared by every query method
/// so the column order only needs to be right in one place.
pub fn row_from_sqlite(row: &rusqlite::Row<'_>) -> rusqlite::Result<FsEntry> {
    let raw_type: i64 = row.get(2)?;
    Ok(FsEntry {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        entry_type: EntryType::from_i64(raw_type),
        name: row.get(3)?,
        size: row.get::<_, i64>(4)? as u64,
        create_time: row.get(5)?,
        modify_time: row.get(6)?,
        path: row.get(7)?,
        base_path: row.get(8)?,
    })
}
