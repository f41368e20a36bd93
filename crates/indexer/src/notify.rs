use std::path::Path;

use fsal_bundles::BundleConfig;
use tracing::warn;

/// One item from a batch delivered by the external notification source
/// (component C10's input; the source itself is an external collaborator —
/// see spec §1).
#[derive(Debug, Clone)]
pub struct Notification {
    pub path: String,
}

impl Notification {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// If `rel` under `base` looks like a bundle, extracts it and returns the
/// common ancestor of the extracted member paths in its place. Otherwise
/// returns `rel` unchanged. Any extraction failure is logged and `rel` is
/// returned as-is (the archive is left for the next scheduled refresh to
/// retry).
pub(crate) fn resolve_notified_path(base: &Path, rel: &str, bundle: &BundleConfig) -> String {
    if !bundle.matches_location(rel) || !base.join(rel).is_file() {
        return rel.to_string();
    }

    let outcome = fsal_bundles::extract(&base.join(rel), base);
    if !outcome.ok || outcome.extracted_rel_paths.is_empty() {
        warn!(path = rel, "notification: bundle extraction failed or was empty, leaving path as-is");
        return rel.to_string();
    }

    if let Err(err) = std::fs::remove_file(base.join(rel)) {
        warn!(path = rel, error = %err, "notification: failed to remove extracted bundle archive");
    }

    common_ancestor(&outcome.extracted_rel_paths)
}

/// The longest shared directory prefix of a set of relative paths, or `.`
/// if they share nothing (including the single-path or empty case, where
/// the ancestor is that path's own parent or `.`).
fn common_ancestor(paths: &[String]) -> String {
    let mut segments: Option<Vec<&str>> = None;
    for path in paths {
        let parent_segments: Vec<&str> = match path.rsplit_once('/') {
            Some((parent, _)) => parent.split('/').collect(),
            None => Vec::new(),
        };
        segments = Some(match segments {
            None => parent_segments,
            Some(prev) => {
                let common_len = prev
                    .iter()
                    .zip(parent_segments.iter())
                    .take_while(|(a, b)| a == b)
                    .count();
                prev[..common_len].to_vec()
            }
        });
    }

    match segments {
        Some(segs) if !segs.is_empty() => segs.join("/"),
        _ => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_ancestor_of_a_single_path_is_its_parent() {
        assert_eq!(common_ancestor(&["bundles/pkg/a.txt".to_string()]), "bundles/pkg");
    }

    #[test]
    fn common_ancestor_of_divergent_paths_is_the_shared_prefix() {
        let paths = vec!["bundles/pkg/a.txt".to_string(), "bundles/pkg/sub/b.txt".to_string()];
        assert_eq!(common_ancestor(&paths), "bundles/pkg");
    }

    #[test]
    fn common_ancestor_with_no_shared_directory_is_dot() {
        let paths = vec!["a.txt".to_string(), "b/c.txt".to_string()];
        assert_eq!(common_ancestor(&paths), ".");
    }

    #[test]
    fn common_ancestor_of_empty_set_is_dot() {
        assert_eq!(common_ancestor(&[]), ".");
    }
}
