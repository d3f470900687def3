use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced by the tag engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Invalid tag: {0:?}")]
    InvalidTag(String),

    #[error("I/O failure on {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Load cancelled")]
    Cancelled,

    #[error("No directory loaded")]
    NotLoaded,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify an I/O error against the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(path),
            _ => Error::IoFailure { path, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let err = Error::io("a.txt", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, Error::NotFound(p) if p == Path::new("a.txt")));

        let err = Error::io("a.txt", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, Error::PermissionDenied(_)));

        let err = Error::io("a.txt", io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert!(matches!(err, Error::IoFailure { .. }));
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_not_loaded_message() {
        assert_eq!(Error::NotLoaded.to_string(), "No directory loaded");
    }
}
