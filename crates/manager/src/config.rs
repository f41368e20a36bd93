use std::path::PathBuf;

use fsal_walker::WalkerConfig;

/// Where the catalog's SQLite database lives.
#[derive(Debug, Clone)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory,
}

/// Everything [`crate::FsDbManager::open`] needs to construct the full
/// catalog stack. Mirrors the recognized configuration keys in spec §6 plus
/// the operational additions `SPEC_FULL.md` §4.11 layers on top.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// `fsal.basepaths`.
    pub base_paths: Vec<PathBuf>,
    /// `fsal.chroot`.
    pub chroot: Option<PathBuf>,
    /// `fsal.blacklist`.
    pub blacklist_patterns: Vec<String>,
    /// Initial whitelist, empty meaning "allow everything" (mutated later
    /// only via `SET_WHITELIST`).
    pub whitelist_prefixes: Vec<String>,
    /// `bundles.bundles_dir`.
    pub bundles_dir: String,
    /// `bundles.bundles_exts`.
    pub bundles_exts: Vec<String>,
    pub store: StoreLocation,
    /// `events.capacity`.
    pub events_capacity: usize,
    pub walker: WalkerConfig,
    /// FIFO directory-id cache capacity (spec §3, 1024).
    pub fifo_capacity: usize,
    /// Row ids batched per prune delete (spec §4.7, 1000).
    pub prune_batch_size: usize,
}

impl ManagerConfig {
    /// A minimal configuration over a single base path, primarily for
    /// tests: in-memory store, no blacklist/whitelist, default bundle
    /// settings, default tuning knobs.
    pub fn single_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base_paths: vec![base.into()],
            chroot: None,
            blacklist_patterns: Vec::new(),
            whitelist_prefixes: Vec::new(),
            bundles_dir: "bundles".to_string(),
            bundles_exts: vec!["zip".to_string()],
            store: StoreLocation::InMemory,
            events_capacity: fsal_events::DEFAULT_CAPACITY,
            walker: WalkerConfig::default(),
            fifo_capacity: 1024,
            prune_batch_size: 1000,
        }
    }
}
