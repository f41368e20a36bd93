use fsal_core::FsalError;
use regex::Regex;

/// A compiled set of exclusion patterns. A relative path is blacklisted iff
/// any pattern matches starting at position 0 of the path (not necessarily
/// matching the whole path).
#[derive(Debug, Clone)]
pub struct Blacklist {
    patterns: Vec<Regex>,
}

impl Blacklist {
    pub fn compile(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self, FsalError> {
        let compiled = patterns
            .into_iter()
            .map(|p| {
                Regex::new(p.as_ref())
                    .map_err(|e| FsalError::InvalidPath(format!("invalid blacklist regex: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns: compiled })
    }

    pub fn empty() -> Self {
        Self { patterns: Vec::new() }
    }

    pub fn is_blacklisted(&self, rel: &str) -> bool {
        self.patterns
            .iter()
            .any(|re| re.find(rel).is_some_and(|m| m.start() == 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_from_start_of_path() {
        let bl = Blacklist::compile(["^\\.git"]).unwrap();
        assert!(bl.is_blacklisted(".git/config"));
        assert!(!bl.is_blacklisted("src/.git-ignored"));
    }

    #[test]
    fn empty_blacklist_matches_nothing() {
        let bl = Blacklist::empty();
        assert!(!bl.is_blacklisted("anything"));
    }

    #[test]
    fn rejects_invalid_regex() {
        assert!(Blacklist::compile(["("]).is_err());
    }
}
