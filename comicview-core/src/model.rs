use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Container format of an opened archive, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Rar,
    Pdf,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("rar") | Some("cbr") => Self::Rar,
            _ => Self::Zip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    path: PathBuf,
    kind: ArchiveKind,
}

impl Archive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = ArchiveKind::from_path(&path);
        Self { path, kind }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn display_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("<unknown>")
    }
}

/// Hex digest of an archive's bytes; the persistence key for bookmarks and
/// layout overrides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a page may share a spread (`Single`) or always stands alone
/// (`Double`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Span {
    #[default]
    Single,
    Double,
}

impl Span {
    /// Landscape and square pages are treated as two-page art.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > 0 && height > 0 && width >= height {
            Self::Double
        } else {
            Self::Single
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Single => Self::Double,
            Self::Double => Self::Single,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    Single,
    #[default]
    Paired,
    Strip,
}

impl PaginationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Paired => "paired",
            Self::Strip => "strip",
        }
    }
}

impl fmt::Display for PaginationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl ReadingDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::LeftToRight => Self::RightToLeft,
            Self::RightToLeft => Self::LeftToRight,
        }
    }
}

/// Decoded RGBA8 pixels of one page.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// One extracted page image.
///
/// A page is loaded exactly when it owns a bitmap, so an unloaded page can
/// never carry stale pixels.
#[derive(Debug, Clone)]
pub struct Page {
    path: PathBuf,
    width: u32,
    height: u32,
    span: Span,
    hidden: bool,
    bitmap: Option<Bitmap>,
}

impl Page {
    /// Creates a visible page, deriving its span from the probed dimensions
    /// when they are known.
    pub fn new(path: impl Into<PathBuf>, dimensions: Option<(u32, u32)>) -> Self {
        let (width, height) = dimensions.unwrap_or((0, 0));
        Self {
            path: path.into(),
            width,
            height,
            span: Span::from_dimensions(width, height),
            hidden: false,
            bitmap: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn is_loaded(&self) -> bool {
        self.bitmap.is_some()
    }

    pub fn bitmap(&self) -> Option<&Bitmap> {
        self.bitmap.as_ref()
    }

    /// Installs a decoded bitmap; dimensions follow the decoded image.
    pub fn load(&mut self, bitmap: Bitmap) {
        self.width = bitmap.width;
        self.height = bitmap.height;
        self.bitmap = Some(bitmap);
    }

    /// Releases the bitmap, keeping metadata. Returns whether anything was
    /// released.
    pub fn unload(&mut self) -> bool {
        self.bitmap.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_kind_follows_extension() {
        assert_eq!(Archive::new("a/b.PDF").kind(), ArchiveKind::Pdf);
        assert_eq!(Archive::new("a/b.cbr").kind(), ArchiveKind::Rar);
        assert_eq!(Archive::new("a/b.cbz").kind(), ArchiveKind::Zip);
        assert_eq!(Archive::new("a/b").kind(), ArchiveKind::Zip);
    }

    #[test]
    fn span_is_derived_from_aspect_ratio() {
        assert_eq!(Span::from_dimensions(1200, 800), Span::Double);
        assert_eq!(Span::from_dimensions(800, 800), Span::Double);
        assert_eq!(Span::from_dimensions(800, 1200), Span::Single);
        assert_eq!(Span::from_dimensions(0, 0), Span::Single);
        assert_eq!(Page::new("x.png", Some((20, 10))).span(), Span::Double);
        assert_eq!(Page::new("x.png", None).span(), Span::Single);
    }

    #[test]
    fn unload_drops_bitmap_and_keeps_metadata() {
        let mut page = Page::new("x.png", None);
        page.load(Bitmap {
            width: 2,
            height: 3,
            pixels: vec![0; 24],
        });
        assert!(page.is_loaded());
        assert!(page.unload());
        assert!(!page.is_loaded());
        assert!(page.bitmap().is_none());
        assert_eq!((page.width(), page.height()), (2, 3));
        assert!(!page.unload());
    }
}
