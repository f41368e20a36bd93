//! Argument parsing (component C13): the flag set is deliberately narrow —
//! a config file, a pidfile, a socket override, and a foreground switch for
//! supervised/systemd use and for integration tests that want to drive the
//! daemon without forking.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "fsald", about = "File system abstraction layer daemon")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the pidfile written on daemonization.
    #[arg(long, value_name = "PATH", default_value = "/var/run/fsald.pid")]
    pub pid_file: PathBuf,

    /// Skip the double-fork and run in the foreground, logging to stderr.
    #[arg(long)]
    pub foreground: bool,

    /// Overrides `socket.path` from the config file.
    #[arg(long, value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

impl Cli {
    pub fn parse_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args)
    }
}
