use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single extraction attempt.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("rar: {0}")]
    Rar(String),

    #[error("pdf: {0}")]
    Pdf(String),

    #[error("failed to write {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("an extraction worker exited before reporting")]
    WorkerLost,
}

impl ExtractError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
