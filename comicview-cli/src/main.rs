use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comicview_archive::{ArchiveExtractor, Blake3Hasher, ImageDecoder};
use comicview_core::{
    project_dirs, Backends, FileStateStore, PaginationMode, ReaderConfig, Reader, Session, Span,
    SpreadLayout, StateStore, TempScratch,
};
use directories::ProjectDirs;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "comicview",
    version,
    about = "Inspect comic archives and their saved reading state"
)]
struct Args {
    /// Read settings from this file instead of the platform config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding bookmarks and layouts
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Summary of an archive and its reading position
    Info {
        archive: PathBuf,
        /// Page to look at (0-based)
        #[arg(short = 'p', long = "page")]
        page: Option<usize>,
    },
    /// List the spreads of an archive
    Spreads {
        archive: PathBuf,
        /// Lay out with this mode instead of the saved one, without saving it
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// List pages with their dimensions, span and visibility
    Pages { archive: PathBuf },
    Bookmark {
        #[command(subcommand)]
        action: BookmarkAction,
    },
    /// Toggle whether a page is hidden
    Hide { archive: PathBuf, page: usize },
    /// Toggle whether a page spans two slots
    Span { archive: PathBuf, page: usize },
    /// Change and save the pagination mode
    Mode {
        archive: PathBuf,
        #[arg(value_enum)]
        mode: ModeArg,
    },
}

#[derive(Debug, Subcommand)]
enum BookmarkAction {
    Add { archive: PathBuf, page: usize },
    Remove { archive: PathBuf, page: usize },
    List { archive: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Single,
    Paired,
    Strip,
}

impl From<ModeArg> for PaginationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => PaginationMode::Single,
            ModeArg::Paired => PaginationMode::Paired,
            ModeArg::Strip => PaginationMode::Strip,
        }
    }
}

impl CliCommand {
    fn archive(&self) -> &Path {
        match self {
            Self::Info { archive, .. }
            | Self::Spreads { archive, .. }
            | Self::Pages { archive }
            | Self::Hide { archive, .. }
            | Self::Span { archive, .. }
            | Self::Mode { archive, .. } => archive,
            Self::Bookmark { action } => match action {
                BookmarkAction::Add { archive, .. }
                | BookmarkAction::Remove { archive, .. }
                | BookmarkAction::List { archive } => archive,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let dirs = project_dirs();
    let _log_guard = init_logging(dirs.as_ref())?;

    let mut config = match &args.config {
        Some(path) => ReaderConfig::load_from(path),
        None => ReaderConfig::load(),
    }
    .context("failed to load configuration")?;
    if let Some(dir) = &args.state_dir {
        config.state_dir = Some(dir.clone());
    }
    let state_dir = config
        .resolved_state_dir()
        .ok_or_else(|| anyhow!("unable to resolve a state directory; pass --state-dir"))?;
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(state_dir)?);

    let backends = Backends {
        provider: Arc::new(ArchiveExtractor::from_config(&config)),
        hasher: Arc::new(Blake3Hasher),
        decoder: Arc::new(ImageDecoder),
        scratch: Arc::new(TempScratch::new()),
        store,
    };
    let mut reader = Reader::new(backends, config);

    let path = args.command.archive();
    let session = reader
        .open_archive(path)
        .await
        .with_context(|| format!("failed to open {:?}", path))?;
    debug!(key = %session.key(), "archive opened");

    let outcome = run(&args.command, session);
    let closed = reader
        .close_archive()
        .context("failed to save reading state");
    outcome?;
    closed
}

fn run(command: &CliCommand, session: &mut Session) -> Result<()> {
    match command {
        CliCommand::Info { page, .. } => {
            if let Some(page) = page {
                session.set_current_page(*page)?;
            }
            print_info(session);
        }
        CliCommand::Spreads { mode, .. } => {
            let layout = match mode {
                Some(mode) => SpreadLayout::compute(session.pages(), (*mode).into()),
                None => session.layout().clone(),
            };
            print_spreads(&layout);
        }
        CliCommand::Pages { .. } => print_pages(session),
        CliCommand::Bookmark { action } => match action {
            BookmarkAction::Add { page, .. } => {
                if session.add_bookmark(*page)? {
                    println!("bookmarked page {page}");
                } else {
                    println!("page {page} is already bookmarked");
                }
            }
            BookmarkAction::Remove { page, .. } => {
                if session.remove_bookmark(*page)? {
                    println!("removed bookmark on page {page}");
                } else {
                    println!("page {page} has no bookmark");
                }
            }
            BookmarkAction::List { .. } => {
                for entry in session.bookmarks().entries() {
                    println!("{}\t{}", entry.page, entry.created.to_rfc3339());
                }
            }
        },
        CliCommand::Hide { page, .. } => {
            session.toggle_hidden(*page)?;
            let hidden = session.page(*page).is_some_and(|p| p.is_hidden());
            println!(
                "page {page} is now {}; {} spreads",
                if hidden { "hidden" } else { "visible" },
                session.layout().len()
            );
        }
        CliCommand::Span { page, .. } => {
            session.toggle_span(*page)?;
            let span = session.page(*page).map(|p| p.span()).unwrap_or_default();
            println!(
                "page {page} now spans {}; {} spreads",
                span_label(span),
                session.layout().len()
            );
        }
        CliCommand::Mode { mode, .. } => {
            session.set_pagination_mode((*mode).into())?;
            println!(
                "mode {}; {} spreads",
                session.state().mode,
                session.layout().len()
            );
        }
    }
    Ok(())
}

fn print_info(session: &Session) {
    let state = session.state();
    let memory = session.memory_usage();
    println!("archive:   {}", session.archive().display_name());
    println!("kind:      {:?}", session.archive().kind());
    println!("hash:      {}", session.key());
    println!("pages:     {}", session.pages().len());
    println!("spreads:   {}", session.layout().len());
    println!("mode:      {}", state.mode);
    println!("page:      {}", state.current_page);
    match session.current_spread() {
        Some(view) => println!(
            "spread:    {} {}",
            view.index,
            format_pages(&view.pages)
        ),
        None => println!("spread:    none"),
    }
    println!("bookmarks: {}", session.bookmarks().len());
    println!(
        "resident:  {} pages, {} bytes",
        memory.resident_pages, memory.bytes
    );
}

fn print_spreads(layout: &SpreadLayout) {
    for (index, spread) in layout.spreads().iter().enumerate() {
        println!("{index}\t{}", format_pages(spread.pages()));
    }
}

fn print_pages(session: &Session) {
    let scratch = session.scratch_dir();
    for (index, page) in session.pages().iter().enumerate() {
        let name = scratch
            .and_then(|root| page.path().strip_prefix(root).ok())
            .unwrap_or_else(|| page.path());
        let bookmark = if session.find_bookmark(index).is_some() {
            "\tbookmarked"
        } else {
            ""
        };
        println!(
            "{index}\t{}\t{}x{}\t{}{}{}",
            name.display(),
            page.width(),
            page.height(),
            span_label(page.span()),
            if page.is_hidden() { "\thidden" } else { "" },
            bookmark
        );
    }
}

fn span_label(span: Span) -> &'static str {
    match span {
        Span::Single => "single",
        Span::Double => "double",
    }
}

fn format_pages(pages: &[usize]) -> String {
    let pages: Vec<String> = pages.iter().map(ToString::to_string).collect();
    format!("[{}]", pages.join(","))
}

/// Console logging always goes to stderr. The log file is skipped when the
/// platform data directory is unknown or cannot be created.
fn init_logging(project_dirs: Option<&ProjectDirs>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = project_dirs
        .map(|dirs| dirs.data_local_dir().join("logs"))
        .filter(|dir| fs::create_dir_all(dir).is_ok());
    let (file_layer, guard) = match log_dir {
        Some(log_dir) => {
            let file_appender = tracing_appender::rolling::never(log_dir, "comicview.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
