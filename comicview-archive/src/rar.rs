use std::fmt::Display;
use std::path::{Path, PathBuf};

use tracing::debug;
use unrar::Archive;

use crate::error::ExtractError;
use crate::{is_image_path, scan};

fn rar_error(err: impl Display) -> ExtractError {
    ExtractError::Rar(err.to_string())
}

/// Extracts the image entries of a rar archive in one pass and rescans the
/// scratch directory for the result.
pub(crate) fn extract(path: &Path, scratch: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut archive = Archive::new(path)
        .open_for_processing()
        .map_err(rar_error)?;
    let mut written = 0usize;
    while let Some(header) = archive.read_header().map_err(rar_error)? {
        let entry = header.entry();
        let wanted = entry.is_file() && is_image_path(&entry.filename);
        archive = if wanted {
            written += 1;
            header.extract_with_base(scratch)
        } else {
            header.skip()
        }
        .map_err(rar_error)?;
    }
    debug!(written, "extracted rar entries");
    scan::collect_images(scratch)
}
