/// Criteria for a name-token search (`SEARCH`, spec §4.8), scoped across a
/// set of base paths (search is not anchored to a single base the way
/// `list_dir`/`list_descendants` are).
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub bases: Vec<String>,
    pub tokens: Vec<String>,
    pub whole_words: bool,
    pub exclude: Vec<String>,
}

impl SearchQuery {
    /// SQL and binds matching rows whose `name` contains (or, if
    /// `whole_words`, exactly equals) ANY token, case-insensitively, and
    /// whose `name` is not a literal excluded basename.
    pub fn to_sql(&self, page_size: i64, offset: i64) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        let base_placeholders = std::iter::repeat("?").take(self.bases.len()).collect::<Vec<_>>().join(", ");
        clauses.push(format!("base_path IN ({base_placeholders})"));
        binds.extend(self.bases.iter().cloned());

        let mut token_ors = Vec::new();
        for token in &self.tokens {
            if self.whole_words {
                token_ors.push("LOWER(name) = LOWER(?)".to_string());
                binds.push(token.clone());
            } else {
                token_ors.push("LOWER(name) LIKE LOWER(?) ESCAPE '\\'".to_string());
                binds.push(format!("%{}%", escape_like(token)));
            }
        }
        if !token_ors.is_empty() {
            clauses.push(format!("({})", token_ors.join(" OR ")));
        }

        for excluded in &self.exclude {
            clauses.push("name != ?".to_string());
            binds.push(excluded.clone());
        }

        let sql = format!(
            "SELECT id, parent_id, type, name, size, create_time, modify_time, path, base_path
             FROM fsentries WHERE {} ORDER BY path ASC LIMIT ? OFFSET ?",
            clauses.join(" AND "),
        );
        binds.push(page_size.to_string());
        binds.push(offset.to_string());
        (sql, binds)
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_search_lowercases_both_sides() {
        let query = SearchQuery {
            bases: vec!["/tmp/r".to_string()],
            tokens: vec!["Readme".to_string()],
            whole_words: false,
            exclude: Vec::new(),
        };
        let (sql, binds) = query.to_sql(500, 0);
        assert!(sql.contains("LOWER(name) LIKE LOWER(?)"));
        assert_eq!(binds[1], "%Readme%");
    }

    #[test]
    fn whole_word_search_uses_exact_equality() {
        let query = SearchQuery {
            bases: vec!["/tmp/r".to_string()],
            tokens: vec!["readme".to_string()],
            whole_words: true,
            exclude: Vec::new(),
        };
        let (sql, _binds) = query.to_sql(500, 0);
        assert!(sql.contains("LOWER(name) = LOWER(?)"));
    }

    #[test]
    fn excludes_are_literal_name_inequalities() {
        let query = SearchQuery {
            bases: vec!["/tmp/r".to_string()],
            tokens: vec!["readme".to_string()],
            whole_words: false,
            exclude: vec!["readme.bak".to_string()],
        };
        let (sql, binds) = query.to_sql(500, 0);
        assert!(sql.contains("name != ?"));
        assert!(binds.contains(&"readme.bak".to_string()));
    }
}
