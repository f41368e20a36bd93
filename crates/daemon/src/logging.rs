//! Logging initialization (component C13). The subscriber is installed
//! before the double-fork so early fatal errors (bad config, unbindable
//! socket) are still observable on stderr; once daemonized, stdout/stderr
//! are unavailable, so a foreground run keeps logging there while a
//! detached run is expected to be supervised by something that captures
//! its output (journald, a log file redirect) rather than this process
//! reopening one itself.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` formatter driven by `RUST_LOG`
/// (`fsald=info` if unset). Safe to call exactly once per process.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fsald=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
