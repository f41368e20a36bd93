//! Bundle (archive) detection and safe extraction (component C6).
//!
//! A bundle is an archive file living under a configured subdirectory of a
//! base path whose extension is in a configured set. The indexer (C7) scans
//! for bundles after pruning and before the walk/diff update pass, and
//! deletes each archive once it has been extracted in place.

use std::path::{Path, PathBuf};

use zip::ZipArchive;

/// Where bundles live and what counts as one, scoped to a single base path.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Relative path (from the base) of the directory bundles are expected
    /// under, e.g. `"bundles"`.
    pub bundles_dir: String,
    /// Extensions (without the leading dot) that mark a file as a bundle,
    /// matched case-insensitively.
    pub extensions: Vec<String>,
}

impl BundleConfig {
    pub fn new(bundles_dir: impl Into<String>, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            bundles_dir: bundles_dir.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    /// True iff `rel` lies at or under `bundles_dir` and carries a
    /// recognized extension. Does not touch the filesystem; callers are
    /// expected to have already confirmed `rel` is an existing regular file
    /// (the walker only yields entries it has stat-ed).
    pub fn matches_location(&self, rel: &str) -> bool {
        if self.extensions.is_empty() {
            return false;
        }
        let under_bundles_dir =
            rel == self.bundles_dir || rel.starts_with(&format!("{}/", self.bundles_dir));
        if !under_bundles_dir {
            return false;
        }
        let Some(ext) = Path::new(rel).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

/// `is_bundle(base, rel)`: `rel` resolves to an existing regular file under
/// `base`, it lies under the configured bundle subdirectory, and its
/// extension is recognized.
pub fn is_bundle(config: &BundleConfig, base_abs: &Path, rel: &str) -> bool {
    if !config.matches_location(rel) {
        return false;
    }
    base_abs.join(rel).is_file()
}

/// The outcome of an extraction attempt.
#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    pub ok: bool,
    /// Relative (to `base_abs`) paths of every member successfully
    /// extracted. Empty when `ok` is false.
    pub extracted_rel_paths: Vec<String>,
}

/// Opens `bundle_abs` as a zip archive and extracts every member into
/// `base_abs`, rejecting the whole archive if any member's joined path
/// would land outside `base_abs` (a zip-slip guard). On any failure —
/// malformed archive or a path escape — returns `ok: false` and an empty
/// list; the caller (indexer) leaves the archive on disk to retry on the
/// next refresh.
pub fn extract(bundle_abs: &Path, base_abs: &Path) -> ExtractOutcome {
    match extract_inner(bundle_abs, base_abs) {
        Ok(extracted) => ExtractOutcome {
            ok: true,
            extracted_rel_paths: extracted,
        },
        Err(err) => {
            tracing::warn!(bundle = %bundle_abs.display(), error = %err, "bundle extraction failed");
            ExtractOutcome {
                ok: false,
                extracted_rel_paths: Vec::new(),
            }
        }
    }
}

fn extract_inner(bundle_abs: &Path, base_abs: &Path) -> Result<Vec<String>, String> {
    let file = std::fs::File::open(bundle_abs).map_err(|e| e.to_string())?;
    let mut archive = ZipArchive::new(file).map_err(|e| e.to_string())?;

    // First pass: resolve and validate every member's destination before
    // writing anything, so a malicious archive can't get a partial extract.
    let mut destinations = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(|e| e.to_string())?;
        let Some(enclosed) = entry.enclosed_name() else {
            return Err(format!("archive member {} has an unsafe path", entry.name()));
        };
        let dest = lexically_join(base_abs, &enclosed);
        if !dest.starts_with(base_abs) {
            return Err(format!("archive member {} escapes extraction root", entry.name()));
        }
        destinations.push((index, dest, entry.is_dir()));
    }

    let mut extracted = Vec::with_capacity(destinations.len());
    for (index, dest, is_dir) in destinations {
        if is_dir {
            std::fs::create_dir_all(&dest).map_err(|e| e.to_string())?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let mut entry = archive.by_index(index).map_err(|e| e.to_string())?;
        let mut out = std::fs::File::create(&dest).map_err(|e| e.to_string())?;
        std::io::copy(&mut entry, &mut out).map_err(|e| e.to_string())?;

        if let Ok(rel) = dest.strip_prefix(base_abs) {
            extracted.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    Ok(extracted)
}

fn lexically_join(base: &Path, rel: &Path) -> PathBuf {
    let mut out = base.to_path_buf();
    for component in rel.components() {
        match component {
            std::path::Component::Normal(part) => out.push(part),
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            _ => {}
        }
    }
    out
}
