use fsal_core::EntryType;

/// Sort order for `select_descendants`, applied before any limit/offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    PathAsc,
    PathDesc,
    ModifyTimeAsc,
    ModifyTimeDesc,
}

impl Order {
    fn to_sql(self) -> &'static str {
        match self {
            Order::PathAsc => "path ASC",
            Order::PathDesc => "path DESC",
            Order::ModifyTimeAsc => "modify_time ASC",
            Order::ModifyTimeDesc => "modify_time DESC",
        }
    }
}

/// Criteria for a `select_descendants` query: everything under `base_path`
/// whose path starts with `path_prefix` (empty = whole base), narrowed by
/// the optional entry type, modification-time span, ignore list, and
/// whitelist.
#[derive(Debug, Clone)]
pub struct DescendantFilter {
    pub base_path: String,
    /// Relative path prefix to restrict the search to; `""` means the
    /// entire base (spec's `.` root).
    pub path_prefix: String,
    pub entry_type: Option<EntryType>,
    /// Only rows with `modify_time >= this` are returned, if set.
    pub modified_after: Option<i64>,
    /// Relative path prefixes to exclude (and their subtrees).
    pub ignored_paths: Vec<String>,
    /// If non-empty, a row must fall under one of these prefixes (and their
    /// subtrees) to be included.
    pub whitelist: Vec<String>,
    pub order: Order,
}

impl DescendantFilter {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            path_prefix: String::new(),
            entry_type: None,
            modified_after: None,
            ignored_paths: Vec::new(),
            whitelist: Vec::new(),
            order: Order::PathAsc,
        }
    }

    fn where_clause(&self) -> (String, Vec<String>) {
        let mut clauses = vec!["base_path = ?".to_string()];
        let mut binds = vec![self.base_path.clone()];

        if !self.path_prefix.is_empty() {
            clauses.push("(path = ? OR path LIKE ? ESCAPE '\\')".to_string());
            binds.push(self.path_prefix.clone());
            binds.push(format!("{}/%", escape_like(&self.path_prefix)));
        }

        if let Some(entry_type) = self.entry_type {
            clauses.push("type = ?".to_string());
            binds.push((entry_type.as_i64()).to_string());
        }

        if let Some(modified_after) = self.modified_after {
            clauses.push("modify_time >= ?".to_string());
            binds.push(modified_after.to_string());
        }

        for ignored in &self.ignored_paths {
            clauses.push("NOT (path = ? OR path LIKE ? ESCAPE '\\')".to_string());
            binds.push(ignored.clone());
            binds.push(format!("{}/%", escape_like(ignored)));
        }

        if !self.whitelist.is_empty() {
            let mut ors = Vec::new();
            for allowed in &self.whitelist {
                ors.push("(path = ? OR path LIKE ? ESCAPE '\\')".to_string());
                binds.push(allowed.clone());
                binds.push(format!("{}/%", escape_like(allowed)));
            }
            clauses.push(format!("({})", ors.join(" OR ")));
        }

        (clauses.join(" AND "), binds)
    }

    /// SQL and binds for one page of the unbounded streaming query: rows
    /// past `offset`, up to `page_size`.
    pub fn to_sql(&self, page_size: i64, offset: i64) -> (String, Vec<String>) {
        let (where_sql, mut binds) = self.where_clause();
        let sql = format!(
            "SELECT id, parent_id, type, name, size, create_time, modify_time, path, base_path
             FROM fsentries WHERE {where_sql} ORDER BY {order} LIMIT ? OFFSET ?",
            where_sql = where_sql,
            order = self.order.to_sql(),
        );
        binds.push(page_size.to_string());
        binds.push(offset.to_string());
        (sql, binds)
    }

    /// SQL and binds for a single bounded page, honoring a caller-supplied
    /// limit/offset (used for the protocol-level count/offset/limit knobs).
    pub fn to_page_sql(&self, limit: i64, offset: i64) -> (String, Vec<String>) {
        self.to_sql(limit, offset)
    }

    pub fn to_count_sql(&self) -> (String, Vec<String>) {
        let (where_sql, binds) = self.where_clause();
        let sql = format!("SELECT COUNT(*) FROM fsentries WHERE {where_sql}");
        (sql, binds)
    }
}

/// Escapes `%`, `_` and `\` in a literal path segment being embedded in a
/// `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_clause_scopes_to_base_path_by_default() {
        let filter = DescendantFilter::new("/tmp/r");
        let (sql, binds) = filter.where_clause();
        assert_eq!(sql, "base_path = ?");
        assert_eq!(binds, vec!["/tmp/r".to_string()]);
    }

    #[test]
    fn ignored_paths_add_subtree_exclusions() {
        let mut filter = DescendantFilter::new("/tmp/r");
        filter.ignored_paths.push("cache".to_string());
        let (sql, binds) = filter.where_clause();
        assert!(sql.contains("NOT (path = ? OR path LIKE ? ESCAPE '\\')"));
        assert_eq!(binds[1], "cache");
        assert_eq!(binds[2], "cache/%");
    }

    #[test]
    fn whitelist_restricts_to_listed_subtrees() {
        let mut filter = DescendantFilter::new("/tmp/r");
        filter.whitelist.push("docs".to_string());
        let (sql, _binds) = filter.where_clause();
        assert!(sql.contains("path = ? OR path LIKE ? ESCAPE '\\'"));
    }
}
