use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a single page image into a bitmap.
///
/// Always absorbed by the decode window: the page stays unloaded and the
/// rest of the archive remains navigable.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read page image {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported or corrupt page image {path:?}: {reason}")]
    Image { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum ReaderError {
    /// Every extractor in the attempt list rejected the file.
    #[error("no extractor accepted {path:?} ({})", .attempts.join("; "))]
    ArchiveFormat { path: PathBuf, attempts: Vec<String> },

    #[error("i/o failure while extracting {path:?}")]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to read persisted state {path:?}: {reason}")]
    PersistenceRead { path: PathBuf, reason: String },

    #[error("failed to write persisted state {path:?}")]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to hash {path:?}")]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create scratch directory")]
    Scratch(#[source] io::Error),

    #[error("page {index} out of range (archive has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("spread {index} out of range (layout has {count} spreads)")]
    SpreadOutOfRange { index: usize, count: usize },

    #[error("invalid configuration {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl ReaderError {
    pub fn archive_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ArchiveIo {
            path: path.into(),
            source,
        }
    }

    pub fn persistence_write(path: impl Into<PathBuf>, source: impl Into<io::Error>) -> Self {
        Self::PersistenceWrite {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T, E = ReaderError> = std::result::Result<T, E>;
