//! Archive backends for comicview: extraction of zip, rar and pdf comics into
//! a scratch directory, content hashing and page decoding.

mod decode;
mod error;
mod hash;
#[cfg(feature = "pdf")]
mod pdf;
#[cfg(feature = "rar")]
mod rar;
mod scan;
mod unzip;

use std::io;
use std::path::{Path, PathBuf};

use comicview_core::{Archive, ArchiveKind, ArchiveProvider, ReaderConfig, ReaderError, Result};
use tracing::{debug, info, instrument, warn};

pub use decode::ImageDecoder;
pub use error::ExtractError;
pub use hash::Blake3Hasher;
#[cfg(feature = "pdf")]
pub use pdf::PDFIUM_LIBRARY_ENV;

/// File extensions treated as pages, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif", "heic", "gif"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Reading order is plain lexicographic order of the full path.
pub fn sort_page_paths(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
}

/// Extracts comic archives, trying zip first and falling back to rar.
/// Pdf files only go through the pdf extractor.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    workers: usize,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::from_config(&ReaderConfig::default())
    }
}

impl ArchiveExtractor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn from_config(config: &ReaderConfig) -> Self {
        Self::new(config.worker_count())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs the extractors in order until one accepts the archive. The
    /// scratch directory is emptied between attempts.
    #[instrument(skip(self, scratch), fields(archive = %archive.display_name(), workers = self.workers))]
    pub fn extract_blocking(&self, archive: &Archive, scratch: &Path) -> Result<Vec<PathBuf>> {
        self.run_attempts(archive.path(), scratch, &self.attempts(archive.kind()))
    }

    fn run_attempts(
        &self,
        path: &Path,
        scratch: &Path,
        attempts: &[Extractor],
    ) -> Result<Vec<PathBuf>> {
        let mut failures: Vec<ExtractError> = Vec::new();

        for (attempt, extractor) in attempts.iter().enumerate() {
            if attempt > 0 {
                scan::clear_dir(scratch).map_err(|err| ReaderError::archive_io(scratch, err))?;
            }
            match extractor(self, path, scratch) {
                Ok(mut pages) => {
                    sort_page_paths(&mut pages);
                    info!(pages = pages.len(), "archive extracted");
                    return Ok(pages);
                }
                Err(err) => {
                    debug!(error = %err, "extractor rejected archive");
                    failures.push(err);
                }
            }
        }

        warn!(attempts = failures.len(), "no extractor accepted the archive");
        Err(classify(path, failures))
    }

    fn attempts(&self, kind: ArchiveKind) -> Vec<Extractor> {
        let mut attempts: Vec<Extractor> = Vec::new();
        match kind {
            ArchiveKind::Pdf => {
                #[cfg(feature = "pdf")]
                attempts.push(try_pdf);
            }
            ArchiveKind::Zip | ArchiveKind::Rar => {
                attempts.push(try_zip);
                #[cfg(feature = "rar")]
                attempts.push(try_rar);
            }
        }
        attempts
    }
}

type ExtractResult = std::result::Result<Vec<PathBuf>, ExtractError>;
type Extractor = fn(&ArchiveExtractor, &Path, &Path) -> ExtractResult;

fn try_zip(this: &ArchiveExtractor, path: &Path, scratch: &Path) -> ExtractResult {
    unzip::extract(path, scratch, this.workers)
}

#[cfg(feature = "rar")]
fn try_rar(_: &ArchiveExtractor, path: &Path, scratch: &Path) -> ExtractResult {
    rar::extract(path, scratch)
}

#[cfg(feature = "pdf")]
fn try_pdf(_: &ArchiveExtractor, path: &Path, scratch: &Path) -> ExtractResult {
    pdf::extract(path, scratch)
}

/// An i/o failure in any attempt means the archive could not be read or the
/// scratch directory not written; otherwise no format matched.
fn classify(path: &Path, failures: Vec<ExtractError>) -> ReaderError {
    let attempts = failures.iter().map(ToString::to_string).collect::<Vec<_>>();
    let io_failure = failures.into_iter().find_map(|err| match err {
        ExtractError::Io { source, .. } => Some(source),
        _ => None,
    });
    match io_failure {
        Some(source) => ReaderError::archive_io(path, source),
        None if attempts.is_empty() => ReaderError::ArchiveFormat {
            path: path.to_path_buf(),
            attempts: vec!["no extractor available for this format".into()],
        },
        None => ReaderError::ArchiveFormat {
            path: path.to_path_buf(),
            attempts,
        },
    }
}

#[async_trait::async_trait]
impl ArchiveProvider for ArchiveExtractor {
    async fn extract(&self, archive: &Archive, scratch: &Path) -> Result<Vec<PathBuf>> {
        let this = self.clone();
        let archive = archive.clone();
        let scratch = scratch.to_path_buf();
        let path = archive.path().to_path_buf();
        tokio::task::spawn_blocking(move || this.extract_blocking(&archive, &scratch))
            .await
            .map_err(|err| ReaderError::archive_io(path, io::Error::other(err)))?
    }
}
