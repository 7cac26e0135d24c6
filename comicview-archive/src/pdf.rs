use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::scan;

pub const PDFIUM_LIBRARY_ENV: &str = "COMICVIEW_PDFIUM_LIBRARY_PATH";

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// Pdfium bindings are process-wide; bind once and share.
fn pdfium() -> Result<&'static Pdfium, ExtractError> {
    PDFIUM.get_or_try_init(bind_pdfium).map_err(ExtractError::Pdf)
}

/// Writes every embedded raster image to `scratch` as PNG, named so that
/// lexical order follows page order, then rescans the directory.
pub(crate) fn extract(path: &Path, scratch: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let pdfium = pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|err| ExtractError::Pdf(format!("failed to open {:?}: {}", path, err)))?;

    let mut written = 0usize;
    for (page_index, page) in document.pages().iter().enumerate() {
        for (object_index, object) in page.objects().iter().enumerate() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let raw = match image_object.get_raw_image() {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(
                        page = page_index,
                        object = object_index,
                        error = %err,
                        "skipping unreadable embedded image"
                    );
                    continue;
                }
            };
            let rgba = raw.to_rgba8();
            let target = scratch.join(format!("page-{page_index:05}-{object_index:03}.png"));
            image::save_buffer(
                &target,
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                image::ColorType::Rgba8,
            )
            .map_err(|err| ExtractError::Io {
                path: target.clone(),
                source: io::Error::other(err),
            })?;
            written += 1;
        }
    }
    debug!(written, "extracted embedded pdf images");
    scan::collect_images(scratch)
}

fn bind_pdfium() -> Result<Pdfium, String> {
    let mut errors = Vec::new();

    if let Some(path) = std::env::var_os(PDFIUM_LIBRARY_ENV).filter(|p| !p.is_empty()) {
        match Pdfium::bind_to_library(&path) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(err) => {
                warn!(
                    "failed to load Pdfium from {}: {}",
                    Path::new(&path).display(),
                    err
                );
                errors.push(format!("{}: {}", Path::new(&path).display(), err));
            }
        }
    }

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => errors.push(format!("{}: {}", cwd_path.display(), err)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(format!(
                "failed to bind to a pdfium library; ensure it is installed ({})",
                errors.join(", ")
            ))
        }
    }
}
