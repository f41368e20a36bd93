//! POSIX double-fork daemonization and pidfile lifecycle (component C13).
//!
//! Standard double-fork: fork once so the parent can exit immediately,
//! `setsid` in the child to detach from the controlling terminal, fork
//! again so the daemon can never reacquire one. The pidfile is opened with
//! an exclusive `fs2` lock held for the remaining process lifetime — a
//! second daemon instance against the same pidfile fails fast instead of
//! silently double-binding the socket.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

#[derive(Debug, thiserror::Error)]
pub enum DaemonizeError {
    #[error("failed to open pidfile {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("pidfile {0} is locked by another running instance")]
    AlreadyRunning(PathBuf),
    #[error("failed to write pidfile {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fork failed: {0}")]
    Fork(std::io::Error),
    #[error("setsid failed: {0}")]
    Setsid(std::io::Error),
}

/// A pidfile held open (and exclusively locked) for the process lifetime.
/// Removes the file on drop so a clean shutdown always leaves none behind.
pub struct PidFile {
    path: PathBuf,
    file: File,
}

impl PidFile {
    /// Opens (creating if needed) and exclusively locks `path`, then writes
    /// the current PID as decimal ASCII. Fails with `AlreadyRunning` if
    /// another live process holds the lock.
    pub fn acquire(path: &Path) -> Result<Self, DaemonizeError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| DaemonizeError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|_| DaemonizeError::AlreadyRunning(path.to_path_buf()))?;

        file.set_len(0).map_err(|source| DaemonizeError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        write!(file, "{}", std::process::id()).map_err(|source| DaemonizeError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        file.flush().map_err(|source| DaemonizeError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Rewrites the pidfile with the calling process's PID. Used after the
    /// second fork, once the final daemon PID is known.
    pub fn rewrite_with_current_pid(&mut self) -> Result<(), DaemonizeError> {
        self.file.set_len(0).map_err(|source| DaemonizeError::Write {
            path: self.path.clone(),
            source,
        })?;
        use std::io::Seek;
        self.file
            .seek(std::io::SeekFrom::Start(0))
            .map_err(|source| DaemonizeError::Write {
                path: self.path.clone(),
                source,
            })?;
        write!(self.file, "{}", std::process::id()).map_err(|source| DaemonizeError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.file.flush().map_err(|source| DaemonizeError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Performs the double-fork. Returns `true` in the grandchild process that
/// should continue running as the daemon; the original process and the
/// intermediate child both exit from within this call and never return.
///
/// # Safety
/// Calls `libc::fork`/`setsid` directly; must run before any additional
/// threads are spawned (tokio's runtime must not yet be started), matching
/// the POSIX requirement that `fork` in a multi-threaded process is
/// unsafe/unreliable.
#[cfg(unix)]
pub unsafe fn daemonize() -> Result<(), DaemonizeError> {
    match libc::fork() {
        -1 => return Err(DaemonizeError::Fork(std::io::Error::last_os_error())),
        0 => {}
        _parent_pid => std::process::exit(0),
    }

    if libc::setsid() == -1 {
        return Err(DaemonizeError::Setsid(std::io::Error::last_os_error()));
    }

    match libc::fork() {
        -1 => return Err(DaemonizeError::Fork(std::io::Error::last_os_error())),
        0 => Ok(()),
        _intermediate_child_pid => std::process::exit(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_writes_current_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fsald.pid");
        let _pid_file = PidFile::acquire(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, std::process::id().to_string());
    }

    #[test]
    fn drop_removes_the_pidfile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fsald.pid");
        {
            let _pid_file = PidFile::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn acquire_fails_while_another_handle_holds_the_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fsald.pid");
        let _held = PidFile::acquire(&path).unwrap();
        let err = PidFile::acquire(&path).unwrap_err();
        assert!(matches!(err, DaemonizeError::AlreadyRunning(_)));
    }
}
