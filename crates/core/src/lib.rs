//! Shared types for the FSAL daemon workspace: catalog rows, change events,
//! base-path configuration, and the error taxonomy every other crate
//! converts its local errors into at its boundary.

mod entry;
mod error;
mod event;
mod paths;

pub use entry::{EntryType, FsEntry};
pub use error::FsalError;
pub use event::ChangeEvent;
pub use paths::BasePaths;

/// Result alias used throughout the workspace.
pub type FsalResult<T> = std::result::Result<T, FsalError>;

/// Id reserved for the synthetic root directory (`.` under the first base
/// path). Never assigned by the store.
pub const ROOT_ID: i64 = 0;
