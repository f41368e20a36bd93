pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS fsentries (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id     INTEGER NOT NULL,
    type          INTEGER NOT NULL,
    name          TEXT NOT NULL,
    size          INTEGER NOT NULL,
    create_time   INTEGER NOT NULL,
    modify_time   INTEGER NOT NULL,
    path          TEXT NOT NULL,
    base_path     TEXT NOT NULL,
    UNIQUE(base_path, path)
);
CREATE INDEX IF NOT EXISTS idx_fsentries_parent ON fsentries(parent_id);
CREATE INDEX IF NOT EXISTS idx_fsentries_base_path ON fsentries(base_path, path);
";
