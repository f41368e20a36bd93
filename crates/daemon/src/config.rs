//! Typed configuration (component C12): a `FsalConfig` loaded from an
//! optional TOML file, overlaid with CLI flags, and validated once at
//! startup. Recognized keys match spec §6 plus the operational additions
//! `SPEC_FULL.md` §4.11 documents.

use std::path::{Path, PathBuf};

use fsal_walker::WalkerConfig;
use serde::Deserialize;

use crate::cli::Cli;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FsalConfig {
    pub fsal: FsalSection,
    pub bundles: BundlesSection,
    pub store: StoreSection,
    pub events: EventsSection,
    pub walker: WalkerSection,
    pub socket: SocketSection,
}

impl Default for FsalConfig {
    fn default() -> Self {
        Self {
            fsal: FsalSection::default(),
            bundles: BundlesSection::default(),
            store: StoreSection::default(),
            events: EventsSection::default(),
            walker: WalkerSection::default(),
            socket: SocketSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FsalSection {
    pub basepaths: Vec<PathBuf>,
    pub chroot: Option<PathBuf>,
    pub blacklist: Vec<String>,
}

impl Default for FsalSection {
    fn default() -> Self {
        Self {
            basepaths: Vec::new(),
            chroot: None,
            blacklist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BundlesSection {
    pub bundles_dir: String,
    pub bundles_exts: Vec<String>,
}

impl Default for BundlesSection {
    fn default() -> Self {
        Self {
            bundles_dir: "bundles".to_string(),
            bundles_exts: vec!["zip".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// sqlite file location; `None` means "alongside the pidfile", resolved
    /// in [`FsalConfig::resolve`].
    pub path: Option<PathBuf>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self { path: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    pub capacity: usize,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self { capacity: 4096 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalkerSection {
    pub cooperative_yield_every: u32,
    pub tick_interval_ms: u64,
}

impl Default for WalkerSection {
    fn default() -> Self {
        Self {
            cooperative_yield_every: 32,
            tick_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SocketSection {
    pub path: Option<PathBuf>,
    pub backlog: u32,
}

impl Default for SocketSection {
    fn default() -> Self {
        Self {
            path: None,
            backlog: 1024,
        }
    }
}

/// Errors encountered while loading or validating configuration. Every
/// variant here is a startup-fatal condition per spec §7.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("fsal.basepaths must contain at least one absolute directory")]
    NoBasePaths,
    #[error("base path {0} is not absolute")]
    RelativeBasePath(PathBuf),
    #[error("invalid blacklist regex {pattern:?}: {source}")]
    BadBlacklistRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("socket.path is required (pass --socket or set it in the config file)")]
    NoSocketPath,
}

impl FsalConfig {
    /// Loads the TOML file at `path` if given, else starts from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlays CLI flag overrides on top of the loaded file (CLI wins).
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(socket) = &cli.socket {
            self.socket.path = Some(socket.clone());
        }
    }

    /// Validates every recognized key and resolves derived defaults
    /// (`store.path` alongside the pidfile). Fatal per spec §7 on failure.
    pub fn resolve(mut self, pid_file: &Path) -> Result<ResolvedConfig, ConfigError> {
        if self.fsal.basepaths.is_empty() {
            return Err(ConfigError::NoBasePaths);
        }
        for base in &self.fsal.basepaths {
            if !base.is_absolute() {
                return Err(ConfigError::RelativeBasePath(base.clone()));
            }
        }
        for pattern in &self.fsal.blacklist {
            regex::Regex::new(pattern).map_err(|source| ConfigError::BadBlacklistRegex {
                pattern: pattern.clone(),
                source,
            })?;
        }
        let socket_path = self.socket.path.take().ok_or(ConfigError::NoSocketPath)?;
        let store_path = self.store.path.take().unwrap_or_else(|| {
            pid_file
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("fsal-catalog.sqlite3")
        });

        Ok(ResolvedConfig {
            base_paths: self.fsal.basepaths,
            chroot: self.fsal.chroot,
            blacklist_patterns: self.fsal.blacklist,
            bundles_dir: self.bundles.bundles_dir,
            bundles_exts: self.bundles.bundles_exts,
            store_path,
            events_capacity: self.events.capacity,
            walker: WalkerConfig {
                cooperative_yield_every: self.walker.cooperative_yield_every,
                tick_interval: std::time::Duration::from_millis(self.walker.tick_interval_ms),
                channel_capacity: WalkerConfig::default().channel_capacity,
            },
            socket_path,
            socket_backlog: self.socket.backlog,
        })
    }
}

/// Fully validated, defaults-resolved configuration ready to build a
/// [`fsal_manager::ManagerConfig`] and bind the protocol server.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_paths: Vec<PathBuf>,
    pub chroot: Option<PathBuf>,
    pub blacklist_patterns: Vec<String>,
    pub bundles_dir: String,
    pub bundles_exts: Vec<String>,
    pub store_path: PathBuf,
    pub events_capacity: usize,
    pub walker: WalkerConfig,
    pub socket_path: PathBuf,
    pub socket_backlog: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_base_paths() {
        let config = FsalConfig::default();
        let err = config.resolve(Path::new("/tmp/fsal.pid")).unwrap_err();
        assert!(matches!(err, ConfigError::NoBasePaths));
    }

    #[test]
    fn rejects_relative_base_path() {
        let mut config = FsalConfig::default();
        config.fsal.basepaths = vec![PathBuf::from("relative")];
        config.socket.path = Some(PathBuf::from("/tmp/fsal.sock"));
        let err = config.resolve(Path::new("/tmp/fsal.pid")).unwrap_err();
        assert!(matches!(err, ConfigError::RelativeBasePath(_)));
    }

    #[test]
    fn rejects_missing_socket_path() {
        let mut config = FsalConfig::default();
        config.fsal.basepaths = vec![PathBuf::from("/tmp/r")];
        let err = config.resolve(Path::new("/tmp/fsal.pid")).unwrap_err();
        assert!(matches!(err, ConfigError::NoSocketPath));
    }

    #[test]
    fn store_path_defaults_alongside_pid_file() {
        let mut config = FsalConfig::default();
        config.fsal.basepaths = vec![PathBuf::from("/tmp/r")];
        config.socket.path = Some(PathBuf::from("/tmp/fsal.sock"));
        let resolved = config.resolve(Path::new("/var/run/fsal.pid")).unwrap();
        assert_eq!(resolved.store_path, PathBuf::from("/var/run/fsal-catalog.sqlite3"));
    }

    #[test]
    fn cli_socket_flag_overrides_config_file_value() {
        let mut config = FsalConfig::default();
        config.socket.path = Some(PathBuf::from("/from/config.sock"));
        let cli = Cli {
            config: None,
            pid_file: PathBuf::from("/tmp/fsal.pid"),
            foreground: true,
            socket: Some(PathBuf::from("/from/cli.sock")),
        };
        config.apply_cli(&cli);
        assert_eq!(config.socket.path, Some(PathBuf::from("/from/cli.sock")));
    }
}
