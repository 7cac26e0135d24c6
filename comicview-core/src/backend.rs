use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{DecodeError, ReaderError, Result};
use crate::model::{Archive, Bitmap, ContentHash};

/// Turns page image files into bitmaps.
pub trait PageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Bitmap, DecodeError>;

    /// Reads width and height without decoding pixel data.
    fn probe(&self, path: &Path) -> Result<(u32, u32), DecodeError>;

    /// Decodes several pages; implementations may fan out across threads.
    /// Results are returned in input order.
    fn decode_batch(&self, paths: &[PathBuf]) -> Vec<Result<Bitmap, DecodeError>> {
        paths.iter().map(|path| self.decode(path)).collect()
    }

    fn probe_batch(&self, paths: &[PathBuf]) -> Vec<Result<(u32, u32), DecodeError>> {
        paths.iter().map(|path| self.probe(path)).collect()
    }
}

/// Extracts the page images of an archive into a scratch directory.
///
/// The returned paths are absolute and sorted in reading order.
#[async_trait::async_trait]
pub trait ArchiveProvider: Send + Sync {
    async fn extract(&self, archive: &Archive, scratch: &Path) -> Result<Vec<PathBuf>>;
}

pub trait ContentHasher: Send + Sync {
    fn hash(&self, path: &Path) -> Result<ContentHash>;
}

/// Hands out scratch directories that are removed when dropped.
pub trait ScratchProvider: Send + Sync {
    fn create(&self) -> Result<TempDir>;
}

/// Scratch directories under the system temp dir, or under `root` when set.
#[derive(Debug, Clone, Default)]
pub struct TempScratch {
    root: Option<PathBuf>,
}

impl TempScratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl ScratchProvider for TempScratch {
    fn create(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("comicview-");
        let dir = match &self.root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(ReaderError::Scratch)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        };
        dir.map_err(ReaderError::Scratch)
    }
}
