//! CLI parsing, configuration loading, POSIX daemon supervision, and the
//! process entry point that wires a [`fsal_manager::FsDbManager`] to the
//! protocol server (components C12/C13 of `SPEC_FULL.md`).

mod cli;
mod config;
mod daemonize;
mod logging;
mod notify_source;

pub use cli::Cli;
pub use config::{ConfigError, FsalConfig, ResolvedConfig};
pub use daemonize::{DaemonizeError, PidFile};
pub use notify_source::{run_notification_loop, NoopSource, NotificationSource};

use std::process::ExitCode;

use fsal_manager::{FsDbManager, ManagerConfig, StoreLocation};
use tokio::sync::watch;

/// The process entry point `src/main.rs` calls. Parses arguments, loads and
/// validates configuration, daemonizes unless `--foreground` was given,
/// then runs the catalog manager and protocol server until a shutdown
/// signal arrives.
pub fn run(args: impl IntoIterator<Item = std::ffi::OsString>) -> ExitCode {
    let cli = match Cli::parse_from_args(args) {
        Ok(cli) => cli,
        Err(err) => {
            eprint!("{err}");
            return exit_code_for_clap_error(&err);
        }
    };

    // Logging is installed before the fork (spec `SPEC_FULL.md` §4.12) so a
    // fatal config or bind error is still observable on stderr even when
    // the caller asked to daemonize.
    logging::init();

    if !cli.foreground {
        #[cfg(unix)]
        // SAFETY: daemonization runs before the tokio runtime starts, so
        // the process is still single-threaded, satisfying fork(2)'s
        // multi-threading caveat.
        if let Err(err) = unsafe { daemonize::daemonize() } {
            tracing::error!(error = %err, "failed to daemonize");
            return ExitCode::FAILURE;
        }
        #[cfg(not(unix))]
        {
            tracing::error!("daemonization is only supported on unix targets; pass --foreground");
            return ExitCode::FAILURE;
        }
    }

    let mut config = match FsalConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    config.apply_cli(&cli);
    let resolved = match config.resolve(&cli.pid_file) {
        Ok(r) => r,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let pid_file = match PidFile::acquire(&cli.pid_file) {
        Ok(p) => p,
        Err(err) => {
            tracing::error!(error = %err, "failed to acquire pidfile");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!(error = %err, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };

    let exit = runtime.block_on(async_main(resolved));
    drop(pid_file);
    exit
}

fn exit_code_for_clap_error(err: &clap::Error) -> ExitCode {
    use clap::error::ErrorKind;
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::from(2),
    }
}

async fn async_main(resolved: ResolvedConfig) -> ExitCode {
    let manager_config = ManagerConfig {
        base_paths: resolved.base_paths,
        chroot: resolved.chroot,
        blacklist_patterns: resolved.blacklist_patterns,
        whitelist_prefixes: Vec::new(),
        bundles_dir: resolved.bundles_dir,
        bundles_exts: resolved.bundles_exts,
        store: StoreLocation::File(resolved.store_path),
        events_capacity: resolved.events_capacity,
        walker: resolved.walker,
        fifo_capacity: 1024,
        prune_batch_size: 1000,
    };

    let (manager, _scheduler_join) = match FsDbManager::open(manager_config).await {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(error = %err, "failed to open the catalog store");
            return ExitCode::FAILURE;
        }
    };

    // Bootstrap: index whatever is already on disk before serving queries.
    manager.refresh();

    let notify_task = tokio::spawn(run_notification_loop(manager.clone(), NoopSource));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_fut = fsal_protocol::serve(manager, &resolved.socket_path, shutdown_rx);
    tokio::pin!(server_fut);

    let result = tokio::select! {
        result = &mut server_fut => result,
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            server_fut.await
        }
    };

    notify_task.abort();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "protocol server exited with an error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "failed to register SIGTERM handler");
            std::future::pending::<()>().await;
            unreachable!()
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "failed to register SIGINT handler");
            std::future::pending::<()>().await;
            unreachable!()
        }
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
