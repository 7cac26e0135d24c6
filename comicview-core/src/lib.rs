//! Reading core for paginated comic archives: page model, spread layout,
//! decode window, bookmark and layout persistence, and the session that ties
//! them together. Archive backends plug in through the traits in [`backend`].

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod layout;
pub mod model;
pub mod session;
pub mod store;

pub use backend::{ArchiveProvider, ContentHasher, PageDecoder, ScratchProvider, TempScratch};
pub use cache::{memory_usage, DecodeWindow, MemoryUsage, RefreshReport, DEFAULT_WINDOW_SIZE};
pub use config::{project_dirs, ReaderConfig};
pub use error::{DecodeError, ReaderError, Result};
pub use layout::{Spread, SpreadLayout};
pub use model::{
    Archive, ArchiveKind, Bitmap, ContentHash, PaginationMode, Page, ReadingDirection, Span,
};
pub use session::{Backends, Command, Reader, Session, SessionEvent, SessionState, SpreadView};
pub use store::{
    BookmarkDocument, BookmarkEntry, Bookmarks, FileStateStore, LayoutDocument, MemoryStateStore,
    PageLayout, StateStore, FORMAT_VERSION,
};
