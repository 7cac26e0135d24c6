use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::backend::{ArchiveProvider, ContentHasher, PageDecoder, ScratchProvider};
use crate::cache::{memory_usage, DecodeWindow, MemoryUsage, RefreshReport};
use crate::config::ReaderConfig;
use crate::error::{ReaderError, Result};
use crate::layout::SpreadLayout;
use crate::model::{Archive, ContentHash, PaginationMode, Page, ReadingDirection};
use crate::store::{BookmarkDocument, BookmarkEntry, Bookmarks, LayoutDocument, StateStore};

/// Collaborators a session is built from.
#[derive(Clone)]
pub struct Backends {
    pub provider: Arc<dyn ArchiveProvider>,
    pub hasher: Arc<dyn ContentHasher>,
    pub decoder: Arc<dyn PageDecoder>,
    pub scratch: Arc<dyn ScratchProvider>,
    pub store: Arc<dyn StateStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub current_page: usize,
    pub current_spread: usize,
    pub mode: PaginationMode,
    pub direction: ReadingDirection,
    pub fullscreen: bool,
    /// True only while a window refresh decodes pages. Refreshes run inside
    /// `&mut self` calls, so other threads learn about them through the
    /// `RefreshStarted` and `WindowRefreshed` events instead.
    pub loading: bool,
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ExtractionComplete { pages: usize },
    RefreshStarted { spread: usize },
    WindowRefreshed { spread: usize },
    LayoutChanged,
    BookmarksChanged,
    RedrawNeeded,
    Closed,
}

#[derive(Debug, Clone)]
pub enum Command {
    NextSpread,
    PrevSpread,
    FirstSpread,
    LastSpread,
    GotoPage { page: usize },
    GotoSpread { spread: usize },
    SetMode { mode: PaginationMode },
    ToggleHidden { page: usize },
    ToggleSpan { page: usize },
    AddBookmark { page: usize },
    RemoveBookmark { page: usize },
    NextBookmark,
    PrevBookmark,
    ToggleDirection,
    ToggleFullscreen,
}

/// What is on screen at the current position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadView {
    pub index: usize,
    pub pages: Vec<usize>,
    pub verso: usize,
    pub recto: Option<usize>,
}

/// One open archive.
///
/// Every mutation goes through `&mut self`, so spread recomputation and window
/// refreshes are never observed half-done.
pub struct Session {
    archive: Archive,
    key: ContentHash,
    pages: Vec<Page>,
    layout: SpreadLayout,
    state: SessionState,
    bookmarks: Bookmarks,
    window: DecodeWindow,
    decoder: Arc<dyn PageDecoder>,
    store: Arc<dyn StateStore>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
    scratch: Option<TempDir>,
}

impl Session {
    /// Hashes and extracts `path`, restores persisted layout and bookmarks,
    /// and decodes the first window. Any failure before the session exists
    /// removes the scratch directory again.
    #[instrument(skip(backends, config))]
    pub async fn open(backends: &Backends, config: &ReaderConfig, path: &Path) -> Result<Self> {
        let archive = Archive::new(path);
        let key = backends.hasher.hash(archive.path())?;
        let scratch = backends.scratch.create()?;
        let files = backends.provider.extract(&archive, scratch.path()).await?;
        info!(pages = files.len(), key = %key, "archive extracted");

        let window = config.window();
        let mut pages = window.bootstrap(files, backends.decoder.as_ref());
        let mut state = SessionState {
            current_page: 0,
            current_spread: 0,
            mode: config.default_mode,
            direction: config.direction,
            fullscreen: false,
            loading: false,
        };

        match backends.store.load_layout(&key) {
            Ok(Some(doc)) => {
                let applied = doc.apply_to(&mut pages);
                if doc.pages.len() != pages.len() {
                    warn!(
                        stored = doc.pages.len(),
                        extracted = pages.len(),
                        "stored layout has a different page count"
                    );
                }
                debug!(applied, mode = %doc.mode, "restored page layout");
                state.mode = doc.mode;
                state.current_page = doc.current_page.min(pages.len().saturating_sub(1));
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "ignoring unreadable layout"),
        }

        let bookmarks = match backends.store.load_bookmarks(&key) {
            Ok(Some(doc)) => {
                let count = pages.len();
                Bookmarks::from_entries(
                    doc.bookmarks
                        .into_iter()
                        .filter(|entry| entry.page < count)
                        .collect(),
                )
            }
            Ok(None) => Bookmarks::default(),
            Err(err) => {
                warn!(error = %err, "ignoring unreadable bookmarks");
                Bookmarks::default()
            }
        };

        let layout = SpreadLayout::compute(&pages, state.mode);
        let mut session = Self {
            archive,
            key,
            pages,
            layout,
            state,
            bookmarks,
            window,
            decoder: Arc::clone(&backends.decoder),
            store: Arc::clone(&backends.store),
            events: Arc::new(Mutex::new(Vec::new())),
            scratch: Some(scratch),
        };
        session.push(SessionEvent::ExtractionComplete {
            pages: session.pages.len(),
        });
        session.sync_spread_from_page();
        session.refresh();
        Ok(session)
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn key(&self) -> &ContentHash {
        &self.key
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn layout(&self) -> &SpreadLayout {
        &self.layout
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn bookmarks(&self) -> &Bookmarks {
        &self.bookmarks
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    pub fn memory_usage(&self) -> MemoryUsage {
        memory_usage(&self.pages)
    }

    pub fn events(&self) -> Arc<Mutex<Vec<SessionEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn drain_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn current_spread(&self) -> Option<SpreadView> {
        let index = self.state.current_spread;
        self.layout.spread(index).map(|spread| SpreadView {
            index,
            pages: spread.pages().to_vec(),
            verso: spread.verso(),
            recto: spread.recto(),
        })
    }

    pub fn set_pagination_mode(&mut self, mode: PaginationMode) -> Result<()> {
        if self.state.mode == mode {
            return Ok(());
        }
        self.state.mode = mode;
        self.relayout();
        self.persist_layout()
    }

    pub fn set_current_page(&mut self, index: usize) -> Result<()> {
        self.check_page(index)?;
        if index == self.state.current_page {
            return Ok(());
        }
        self.state.current_page = index;
        let previous = self.state.current_spread;
        self.sync_spread_from_page();
        if self.state.current_spread != previous {
            self.refresh();
        }
        self.push(SessionEvent::RedrawNeeded);
        Ok(())
    }

    pub fn set_current_spread(&mut self, index: usize) -> Result<()> {
        let spread = self
            .layout
            .spread(index)
            .ok_or(ReaderError::SpreadOutOfRange {
                index,
                count: self.layout.len(),
            })?;
        let verso = spread.verso();
        if index == self.state.current_spread && spread.contains(self.state.current_page) {
            return Ok(());
        }
        self.state.current_spread = index;
        self.state.current_page = verso;
        self.refresh();
        self.push(SessionEvent::RedrawNeeded);
        Ok(())
    }

    pub fn toggle_hidden(&mut self, index: usize) -> Result<()> {
        self.check_page(index)?;
        let page = &mut self.pages[index];
        page.set_hidden(!page.is_hidden());
        self.relayout();
        self.persist_layout()
    }

    pub fn toggle_span(&mut self, index: usize) -> Result<()> {
        self.check_page(index)?;
        let page = &mut self.pages[index];
        page.set_span(page.span().toggled());
        self.relayout();
        self.persist_layout()
    }

    /// Returns `Ok(false)` when the page was already bookmarked.
    pub fn add_bookmark(&mut self, index: usize) -> Result<bool> {
        self.check_page(index)?;
        if !self.bookmarks.add(index) {
            return Ok(false);
        }
        self.push(SessionEvent::BookmarksChanged);
        self.persist_bookmarks()?;
        Ok(true)
    }

    pub fn remove_bookmark(&mut self, index: usize) -> Result<bool> {
        if !self.bookmarks.remove(index) {
            return Ok(false);
        }
        self.push(SessionEvent::BookmarksChanged);
        self.persist_bookmarks()?;
        Ok(true)
    }

    pub fn find_bookmark(&self, index: usize) -> Option<&BookmarkEntry> {
        self.bookmarks.find(index)
    }

    pub fn apply(&mut self, command: Command) -> Result<()> {
        let last_spread = self.layout.last_index();
        match command {
            Command::NextSpread => {
                if let Some(last) = last_spread {
                    let next = (self.state.current_spread + 1).min(last);
                    self.set_current_spread(next)?;
                }
            }
            Command::PrevSpread => {
                if last_spread.is_some() {
                    self.set_current_spread(self.state.current_spread.saturating_sub(1))?;
                }
            }
            Command::FirstSpread => {
                if last_spread.is_some() {
                    self.set_current_spread(0)?;
                }
            }
            Command::LastSpread => {
                if let Some(last) = last_spread {
                    self.set_current_spread(last)?;
                }
            }
            Command::GotoSpread { spread } => {
                if let Some(last) = last_spread {
                    self.set_current_spread(spread.min(last))?;
                }
            }
            Command::GotoPage { page } => {
                if let Some(last) = self.pages.len().checked_sub(1) {
                    self.set_current_page(page.min(last))?;
                }
            }
            Command::SetMode { mode } => self.set_pagination_mode(mode)?,
            Command::ToggleHidden { page } => self.toggle_hidden(page)?,
            Command::ToggleSpan { page } => self.toggle_span(page)?,
            Command::AddBookmark { page } => {
                self.add_bookmark(page)?;
            }
            Command::RemoveBookmark { page } => {
                self.remove_bookmark(page)?;
            }
            Command::NextBookmark => {
                if let Some(page) = self
                    .bookmarks
                    .next_after(self.state.current_page)
                    .map(|entry| entry.page)
                {
                    self.set_current_page(page)?;
                }
            }
            Command::PrevBookmark => {
                if let Some(page) = self
                    .bookmarks
                    .previous_before(self.state.current_page)
                    .map(|entry| entry.page)
                {
                    self.set_current_page(page)?;
                }
            }
            Command::ToggleDirection => {
                self.state.direction = self.state.direction.toggled();
                self.push(SessionEvent::RedrawNeeded);
            }
            Command::ToggleFullscreen => {
                self.state.fullscreen = !self.state.fullscreen;
                self.push(SessionEvent::RedrawNeeded);
            }
        }
        Ok(())
    }

    pub fn persist(&self) -> Result<()> {
        let layout = self.persist_layout();
        let bookmarks = self.persist_bookmarks();
        layout.and(bookmarks)
    }

    /// Persists state, releases every bitmap and removes the scratch
    /// directory. Cleanup happens even when persisting fails; the write error
    /// is returned afterwards.
    #[instrument(skip(self), fields(archive = %self.archive.display_name()))]
    pub fn close(mut self) -> Result<()> {
        let persisted = self.persist();
        if let Err(err) = &persisted {
            warn!(error = %err, "failed to persist state on close");
        }
        self.release_scratch();
        self.push(SessionEvent::Closed);
        persisted
    }

    fn release_scratch(&mut self) {
        for page in &mut self.pages {
            page.unload();
        }
        if let Some(scratch) = self.scratch.take() {
            let path = scratch.path().to_path_buf();
            if let Err(err) = scratch.close() {
                warn!(error = %err, path = %path.display(), "failed to remove scratch directory");
            }
        }
    }

    fn check_page(&self, index: usize) -> Result<()> {
        if index < self.pages.len() {
            Ok(())
        } else {
            Err(ReaderError::PageOutOfRange {
                index,
                count: self.pages.len(),
            })
        }
    }

    fn push(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }

    fn sync_spread_from_page(&mut self) {
        self.state.current_spread = self
            .layout
            .page_to_spread(self.state.current_page)
            .unwrap_or(0);
    }

    /// Rebuilds spreads after a layout-affecting change; the current spread is
    /// derived from the current page, never the other way round.
    fn relayout(&mut self) {
        self.layout = SpreadLayout::compute(&self.pages, self.state.mode);
        self.sync_spread_from_page();
        self.refresh();
        self.push(SessionEvent::LayoutChanged);
        self.push(SessionEvent::RedrawNeeded);
    }

    fn refresh(&mut self) -> RefreshReport {
        self.state.loading = true;
        self.push(SessionEvent::RefreshStarted {
            spread: self.state.current_spread,
        });
        let report = self.window.refresh(
            &mut self.pages,
            &self.layout,
            self.state.current_spread,
            self.decoder.as_ref(),
        );
        self.state.loading = false;
        self.push(SessionEvent::WindowRefreshed {
            spread: self.state.current_spread,
        });
        report
    }

    fn persist_layout(&self) -> Result<()> {
        let doc = LayoutDocument::capture(
            &self.key,
            self.state.mode,
            self.state.current_page,
            &self.pages,
        );
        self.store.save_layout(&doc)
    }

    fn persist_bookmarks(&self) -> Result<()> {
        self.store
            .save_bookmarks(&BookmarkDocument::capture(&self.key, &self.bookmarks))
    }
}

/// Holds at most one open session; opening another archive closes the
/// previous one first.
pub struct Reader {
    backends: Backends,
    config: ReaderConfig,
    session: Option<Session>,
}

impl Reader {
    pub fn new(backends: Backends, config: ReaderConfig) -> Self {
        Self {
            backends,
            config,
            session: None,
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    pub async fn open_archive(&mut self, path: &Path) -> Result<&mut Session> {
        if let Some(previous) = self.session.take() {
            if let Err(err) = previous.close() {
                warn!(error = %err, "previous archive closed with errors");
            }
        }
        let session = Session::open(&self.backends, &self.config, path).await?;
        Ok(self.session.insert(session))
    }

    pub fn close_archive(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => session.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;

    use tempfile::tempdir;

    use super::*;
    use crate::backend::TempScratch;
    use crate::cache::tests::FakeDecoder;
    use crate::model::Span;
    use crate::store::MemoryStateStore;

    struct FakeProvider {
        files: Vec<&'static str>,
    }

    #[async_trait::async_trait]
    impl ArchiveProvider for FakeProvider {
        async fn extract(&self, _archive: &Archive, scratch: &Path) -> Result<Vec<PathBuf>> {
            for name in &self.files {
                std::fs::write(scratch.join(name), b"img").unwrap();
            }
            Ok(self.files.iter().map(|name| scratch.join(name)).collect())
        }
    }

    struct FailingProvider;

    #[async_trait::async_trait]
    impl ArchiveProvider for FailingProvider {
        async fn extract(&self, archive: &Archive, scratch: &Path) -> Result<Vec<PathBuf>> {
            std::fs::write(scratch.join("partial.png"), b"img").unwrap();
            Err(ReaderError::ArchiveFormat {
                path: archive.path().to_path_buf(),
                attempts: vec!["zip: invalid archive".into()],
            })
        }
    }

    /// Keys archives by file name.
    struct NameHasher;

    impl ContentHasher for NameHasher {
        fn hash(&self, path: &Path) -> Result<ContentHash> {
            Ok(ContentHash::new(
                path.file_stem().unwrap().to_string_lossy().into_owned(),
            ))
        }
    }

    struct BrokenStore;

    impl StateStore for BrokenStore {
        fn load_bookmarks(&self, key: &ContentHash) -> Result<Option<BookmarkDocument>> {
            Err(ReaderError::PersistenceRead {
                path: PathBuf::from(key.as_str()),
                reason: "corrupt".into(),
            })
        }

        fn save_bookmarks(&self, _doc: &BookmarkDocument) -> Result<()> {
            Err(ReaderError::persistence_write(
                "bookmarks",
                io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }

        fn load_layout(&self, key: &ContentHash) -> Result<Option<LayoutDocument>> {
            Err(ReaderError::PersistenceRead {
                path: PathBuf::from(key.as_str()),
                reason: "corrupt".into(),
            })
        }

        fn save_layout(&self, _doc: &LayoutDocument) -> Result<()> {
            Err(ReaderError::persistence_write(
                "layouts",
                io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }
    }

    const FIVE: [&str; 5] = ["p0.png", "p1.png", "p2.png", "p3.png", "p4.png"];

    fn backends(
        provider: Arc<dyn ArchiveProvider>,
        store: Arc<dyn StateStore>,
        scratch_root: &Path,
    ) -> Backends {
        Backends {
            provider,
            hasher: Arc::new(NameHasher),
            decoder: Arc::new(FakeDecoder::default()),
            scratch: Arc::new(TempScratch::in_dir(scratch_root)),
            store,
        }
    }

    fn groups(session: &Session) -> Vec<Vec<usize>> {
        session
            .layout()
            .spreads()
            .iter()
            .map(|s| s.pages().to_vec())
            .collect()
    }

    async fn open_with(files: Vec<&'static str>, store: Arc<dyn StateStore>, root: &Path) -> Session {
        let backends = backends(Arc::new(FakeProvider { files }), store, root);
        Session::open(&backends, &ReaderConfig::default(), Path::new("/comics/issue.cbz"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_builds_paired_spreads_and_first_window() {
        let dir = tempdir().unwrap();
        let session = open_with(FIVE.to_vec(), Arc::new(MemoryStateStore::new()), dir.path()).await;

        assert_eq!(groups(&session), vec![vec![0, 1], vec![2, 3], vec![4]]);
        assert_eq!(
            session.current_spread(),
            Some(SpreadView {
                index: 0,
                pages: vec![0, 1],
                verso: 0,
                recto: Some(1),
            })
        );
        assert!(session.pages().iter().all(Page::is_loaded));
        assert!(!session.state().loading);
        let events = session.drain_events();
        assert_eq!(events[0], SessionEvent::ExtractionComplete { pages: 5 });
        let started = events
            .iter()
            .position(|e| *e == SessionEvent::RefreshStarted { spread: 0 })
            .unwrap();
        let finished = events
            .iter()
            .position(|e| *e == SessionEvent::WindowRefreshed { spread: 0 })
            .unwrap();
        assert!(started < finished);
        assert!(session.drain_events().is_empty());
    }

    #[tokio::test]
    async fn navigation_moves_between_spreads() {
        let dir = tempdir().unwrap();
        let mut session =
            open_with(FIVE.to_vec(), Arc::new(MemoryStateStore::new()), dir.path()).await;

        session.apply(Command::NextSpread).unwrap();
        assert_eq!(session.state().current_spread, 1);
        assert_eq!(session.state().current_page, 2);
        session.apply(Command::LastSpread).unwrap();
        session.apply(Command::NextSpread).unwrap();
        assert_eq!(session.state().current_spread, 2);
        session.apply(Command::GotoPage { page: 99 }).unwrap();
        assert_eq!(session.state().current_page, 4);
        session.apply(Command::GotoPage { page: 1 }).unwrap();
        assert_eq!(session.state().current_spread, 0);
        assert!(matches!(
            session.set_current_page(5),
            Err(ReaderError::PageOutOfRange { index: 5, count: 5 })
        ));
        assert!(matches!(
            session.set_current_spread(3),
            Err(ReaderError::SpreadOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn toggles_recompute_spreads_from_the_current_page() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStateStore::new());
        let mut session = open_with(FIVE.to_vec(), store.clone(), dir.path()).await;
        session.set_current_page(3).unwrap();
        assert_eq!(session.state().current_spread, 1);

        session.toggle_span(2).unwrap();
        assert_eq!(groups(&session), vec![vec![0, 1], vec![2], vec![3, 4]]);
        assert_eq!(session.state().current_page, 3);
        assert_eq!(session.state().current_spread, 2);

        session.toggle_hidden(3).unwrap();
        assert_eq!(groups(&session), vec![vec![0, 1], vec![2], vec![4]]);
        assert_eq!(session.state().current_spread, 2);
        assert!(!session.page(3).unwrap().is_loaded());

        let stored = store.load_layout(session.key()).unwrap().unwrap();
        assert_eq!(stored.pages[2].span, Span::Double);
        assert!(stored.pages[3].hidden);

        session.set_pagination_mode(PaginationMode::Strip).unwrap();
        assert_eq!(groups(&session), vec![vec![0, 1, 2, 4]]);
        assert_eq!(session.state().current_spread, 0);
        assert!(matches!(
            session.toggle_hidden(9),
            Err(ReaderError::PageOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn bookmarks_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStateStore::new());
        let mut session = open_with(FIVE.to_vec(), store.clone(), dir.path()).await;
        assert!(session.add_bookmark(3).unwrap());
        assert!(!session.add_bookmark(3).unwrap());
        assert!(session.add_bookmark(1).unwrap());
        assert!(session.remove_bookmark(1).unwrap());
        assert!(!session.remove_bookmark(1).unwrap());
        session.apply(Command::NextBookmark).unwrap();
        assert_eq!(session.state().current_page, 3);
        session.close().unwrap();

        let session = open_with(FIVE.to_vec(), store, dir.path()).await;
        assert_eq!(session.bookmarks().len(), 1);
        assert_eq!(session.find_bookmark(3).map(|e| e.page), Some(3));
        assert!(session.find_bookmark(1).is_none());
        assert_eq!(session.state().current_page, 3);
        assert_eq!(session.state().current_spread, 1);
    }

    #[tokio::test]
    async fn stored_layout_is_reapplied_by_index() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryStateStore::new());
        let four = vec!["a.png", "b.png", "c.png", "d.png"];
        let mut session = open_with(four.clone(), store.clone(), dir.path()).await;
        session.toggle_hidden(1).unwrap();
        session.toggle_span(3).unwrap();
        session.close().unwrap();

        let session = open_with(four, store.clone(), dir.path()).await;
        assert!(session.page(1).unwrap().is_hidden());
        assert_eq!(session.page(3).unwrap().span(), Span::Double);
        assert_eq!(groups(&session), vec![vec![0, 2], vec![3]]);
        drop(session);

        let session = open_with(vec!["a.png", "b.png", "c.png"], store, dir.path()).await;
        assert_eq!(session.pages().len(), 3);
        assert!(session.page(1).unwrap().is_hidden());
        assert_eq!(groups(&session), vec![vec![0, 2]]);
    }

    #[tokio::test]
    async fn failed_open_leaves_no_scratch_directory() {
        let dir = tempdir().unwrap();
        let backends = backends(
            Arc::new(FailingProvider),
            Arc::new(MemoryStateStore::new()),
            dir.path(),
        );
        let result =
            Session::open(&backends, &ReaderConfig::default(), Path::new("/comics/bad.cbz")).await;
        assert!(matches!(result, Err(ReaderError::ArchiveFormat { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unreadable_state_is_absorbed_and_write_errors_surface_after_cleanup() {
        let dir = tempdir().unwrap();
        let mut session = open_with(FIVE.to_vec(), Arc::new(BrokenStore), dir.path()).await;
        assert!(session.bookmarks().is_empty());
        assert_eq!(session.state().mode, PaginationMode::Paired);

        assert!(matches!(
            session.add_bookmark(2),
            Err(ReaderError::PersistenceWrite { .. })
        ));
        assert!(session.find_bookmark(2).is_some());

        let scratch = session.scratch_dir().unwrap().to_path_buf();
        assert!(matches!(
            session.close(),
            Err(ReaderError::PersistenceWrite { .. })
        ));
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn reader_replaces_the_open_session() {
        let dir = tempdir().unwrap();
        let backends = backends(
            Arc::new(FakeProvider {
                files: FIVE.to_vec(),
            }),
            Arc::new(MemoryStateStore::new()),
            dir.path(),
        );
        let mut reader = Reader::new(backends, ReaderConfig::default());
        let first = reader
            .open_archive(Path::new("/comics/one.cbz"))
            .await
            .unwrap()
            .scratch_dir()
            .unwrap()
            .to_path_buf();
        let second = reader
            .open_archive(Path::new("/comics/two.cbz"))
            .await
            .unwrap()
            .scratch_dir()
            .unwrap()
            .to_path_buf();
        assert!(!first.exists());
        assert!(second.exists());
        assert_eq!(reader.session().unwrap().key().as_str(), "two");

        reader.close_archive().unwrap();
        assert!(reader.session().is_none());
        assert!(!second.exists());
    }
}
