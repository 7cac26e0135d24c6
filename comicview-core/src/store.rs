use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};
use crate::model::{ContentHash, PaginationMode, Page, Span};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkEntry {
    pub page: usize,
    pub created: DateTime<Utc>,
}

/// Bookmarks of one archive, unique by page and sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bookmarks {
    entries: Vec<BookmarkEntry>,
}

impl Bookmarks {
    pub fn from_entries(mut entries: Vec<BookmarkEntry>) -> Self {
        entries.sort_by_key(|entry| entry.page);
        entries.dedup_by_key(|entry| entry.page);
        Self { entries }
    }

    /// Returns `false` when the page already has a bookmark.
    pub fn add(&mut self, page: usize) -> bool {
        match self.entries.binary_search_by_key(&page, |entry| entry.page) {
            Ok(_) => false,
            Err(position) => {
                self.entries.insert(
                    position,
                    BookmarkEntry {
                        page,
                        created: Utc::now(),
                    },
                );
                true
            }
        }
    }

    pub fn remove(&mut self, page: usize) -> bool {
        match self.entries.binary_search_by_key(&page, |entry| entry.page) {
            Ok(position) => {
                self.entries.remove(position);
                true
            }
            Err(_) => false,
        }
    }

    pub fn find(&self, page: usize) -> Option<&BookmarkEntry> {
        self.entries
            .binary_search_by_key(&page, |entry| entry.page)
            .ok()
            .map(|position| &self.entries[position])
    }

    pub fn next_after(&self, page: usize) -> Option<&BookmarkEntry> {
        self.entries.iter().find(|entry| entry.page > page)
    }

    pub fn previous_before(&self, page: usize) -> Option<&BookmarkEntry> {
        self.entries.iter().rev().find(|entry| entry.page < page)
    }

    pub fn entries(&self) -> &[BookmarkEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkDocument {
    pub format_version: u32,
    pub comic_ref: ContentHash,
    pub bookmarks: Vec<BookmarkEntry>,
}

impl BookmarkDocument {
    pub fn capture(comic_ref: &ContentHash, bookmarks: &Bookmarks) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            comic_ref: comic_ref.clone(),
            bookmarks: bookmarks.entries().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLayout {
    pub span: Span,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDocument {
    pub format_version: u32,
    pub comic_ref: ContentHash,
    pub mode: PaginationMode,
    #[serde(default)]
    pub current_page: usize,
    pub pages: Vec<PageLayout>,
}

impl LayoutDocument {
    pub fn capture(
        comic_ref: &ContentHash,
        mode: PaginationMode,
        current_page: usize,
        pages: &[Page],
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            comic_ref: comic_ref.clone(),
            mode,
            current_page,
            pages: pages
                .iter()
                .map(|page| PageLayout {
                    span: page.span(),
                    hidden: page.is_hidden(),
                })
                .collect(),
        }
    }

    /// Applies stored overrides index for index. Entries beyond the fresh
    /// page sequence belong to a different edition of the archive and are
    /// ignored. Returns the number of pages updated.
    pub fn apply_to(&self, pages: &mut [Page]) -> usize {
        let mut applied = 0;
        for (page, stored) in pages.iter_mut().zip(&self.pages) {
            page.set_span(stored.span);
            page.set_hidden(stored.hidden);
            applied += 1;
        }
        applied
    }
}

/// Persistence for bookmarks and layout overrides, keyed by content hash.
///
/// `load_*` returns `Ok(None)` when nothing was stored yet.
pub trait StateStore: Send + Sync {
    fn load_bookmarks(&self, key: &ContentHash) -> Result<Option<BookmarkDocument>>;
    fn save_bookmarks(&self, doc: &BookmarkDocument) -> Result<()>;
    fn load_layout(&self, key: &ContentHash) -> Result<Option<LayoutDocument>>;
    fn save_layout(&self, doc: &LayoutDocument) -> Result<()>;
}

/// JSON documents in two sibling directories, `bookmarks/` and `layouts/`.
pub struct FileStateStore {
    bookmarks: PathBuf,
    layouts: PathBuf,
}

impl FileStateStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        let bookmarks = root.join("bookmarks");
        let layouts = root.join("layouts");
        for dir in [&bookmarks, &layouts] {
            fs::create_dir_all(dir).map_err(|err| ReaderError::persistence_write(dir, err))?;
        }
        Ok(Self { bookmarks, layouts })
    }

    fn bookmark_path(&self, key: &ContentHash) -> PathBuf {
        self.bookmarks.join(format!("{key}.json"))
    }

    fn layout_path(&self, key: &ContentHash) -> PathBuf {
        self.layouts.join(format!("{key}.json"))
    }
}

fn read_document<T: serde::de::DeserializeOwned>(
    path: &Path,
    version: impl Fn(&T) -> u32,
) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let read_error = |reason: String| ReaderError::PersistenceRead {
        path: path.to_path_buf(),
        reason,
    };
    let mut file = File::open(path).map_err(|err| read_error(err.to_string()))?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)
        .map_err(|err| read_error(err.to_string()))?;
    let doc: T = serde_json::from_str(&buf).map_err(|err| read_error(err.to_string()))?;
    if version(&doc) != FORMAT_VERSION {
        return Err(read_error(format!(
            "unsupported format version {}",
            version(&doc)
        )));
    }
    Ok(Some(doc))
}

fn write_document<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let payload =
        serde_json::to_string_pretty(doc).map_err(|err| ReaderError::persistence_write(path, err))?;
    let mut file = File::create(&tmp).map_err(|err| ReaderError::persistence_write(&tmp, err))?;
    file.write_all(payload.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|err| ReaderError::persistence_write(&tmp, err))?;
    fs::rename(&tmp, path).map_err(|err| ReaderError::persistence_write(path, err))?;
    Ok(())
}

impl StateStore for FileStateStore {
    fn load_bookmarks(&self, key: &ContentHash) -> Result<Option<BookmarkDocument>> {
        read_document(&self.bookmark_path(key), |doc: &BookmarkDocument| {
            doc.format_version
        })
    }

    fn save_bookmarks(&self, doc: &BookmarkDocument) -> Result<()> {
        write_document(&self.bookmark_path(&doc.comic_ref), doc)
    }

    fn load_layout(&self, key: &ContentHash) -> Result<Option<LayoutDocument>> {
        read_document(&self.layout_path(key), |doc: &LayoutDocument| {
            doc.format_version
        })
    }

    fn save_layout(&self, doc: &LayoutDocument) -> Result<()> {
        write_document(&self.layout_path(&doc.comic_ref), doc)
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    bookmarks: Mutex<HashMap<ContentHash, BookmarkDocument>>,
    layouts: Mutex<HashMap<ContentHash, LayoutDocument>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load_bookmarks(&self, key: &ContentHash) -> Result<Option<BookmarkDocument>> {
        Ok(self.bookmarks.lock().get(key).cloned())
    }

    fn save_bookmarks(&self, doc: &BookmarkDocument) -> Result<()> {
        self.bookmarks
            .lock()
            .insert(doc.comic_ref.clone(), doc.clone());
        Ok(())
    }

    fn load_layout(&self, key: &ContentHash) -> Result<Option<LayoutDocument>> {
        Ok(self.layouts.lock().get(key).cloned())
    }

    fn save_layout(&self, doc: &LayoutDocument) -> Result<()> {
        self.layouts.lock().insert(doc.comic_ref.clone(), doc.clone());
        Ok(())
    }
}
