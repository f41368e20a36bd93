/// A typed record of a create/modify/delete observation, emitted by the
/// indexer (C7) and the mutation engine (C9), consumed by clients via
/// `GET_CHANGES`/`CONFIRM_CHANGES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    FileCreated(String),
    FileModified(String),
    FileDeleted(String),
    DirCreated(String),
    DirModified(String),
    DirDeleted(String),
}

impl ChangeEvent {
    pub fn path(&self) -> &str {
        match self {
            ChangeEvent::FileCreated(p)
            | ChangeEvent::FileModified(p)
            | ChangeEvent::FileDeleted(p)
            | ChangeEvent::DirCreated(p)
            | ChangeEvent::DirModified(p)
            | ChangeEvent::DirDeleted(p) => p,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(
            self,
            ChangeEvent::DirCreated(_) | ChangeEvent::DirModified(_) | ChangeEvent::DirDeleted(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::FileCreated(_) => "FileCreated",
            ChangeEvent::FileModified(_) => "FileModified",
            ChangeEvent::FileDeleted(_) => "FileDeleted",
            ChangeEvent::DirCreated(_) => "DirCreated",
            ChangeEvent::DirModified(_) => "DirModified",
            ChangeEvent::DirDeleted(_) => "DirDeleted",
        }
    }

    pub fn created(path: impl Into<String>, is_dir: bool) -> Self {
        if is_dir {
            ChangeEvent::DirCreated(path.into())
        } else {
            ChangeEvent::FileCreated(path.into())
        }
    }

    pub fn modified(path: impl Into<String>, is_dir: bool) -> Self {
        if is_dir {
            ChangeEvent::DirModified(path.into())
        } else {
            ChangeEvent::FileModified(path.into())
        }
    }

    pub fn deleted(path: impl Into<String>, is_dir: bool) -> Self {
        if is_dir {
            ChangeEvent::DirDeleted(path.into())
        } else {
            ChangeEvent::FileDeleted(path.into())
        }
    }
}
