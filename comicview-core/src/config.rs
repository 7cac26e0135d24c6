use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::cache::{DecodeWindow, DEFAULT_WINDOW_SIZE};
use crate::error::{ReaderError, Result};
use crate::model::{PaginationMode, ReadingDirection};

pub const CONFIG_FILE: &str = "config.toml";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "comicview", "comicview")
}

/// Reader settings from `config.toml`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Number of spreads kept decoded around the reading position.
    pub window_size: usize,
    pub default_mode: PaginationMode,
    pub direction: ReadingDirection,
    /// Zip extraction workers; defaults to the available CPU parallelism.
    pub extract_workers: Option<usize>,
    /// Where bookmarks and layouts are stored.
    pub state_dir: Option<PathBuf>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            default_mode: PaginationMode::default(),
            direction: ReadingDirection::default(),
            extract_workers: None,
            state_dir: None,
        }
    }
}

impl ReaderConfig {
    /// Loads from the platform config directory, falling back to defaults
    /// when there is no config file.
    pub fn load() -> Result<Self> {
        match project_dirs() {
            Some(dirs) => Self::load_from(&dirs.config_dir().join(CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let invalid = |reason: String| ReaderError::Config {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|err| invalid(err.to_string()))?;
        toml::from_str(&content).map_err(|err| invalid(err.to_string()))
    }

    pub fn window(&self) -> DecodeWindow {
        DecodeWindow::new(self.window_size)
    }

    pub fn worker_count(&self) -> usize {
        self.extract_workers
            .filter(|&workers| workers > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
    }

    pub fn resolved_state_dir(&self) -> Option<PathBuf> {
        self.state_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_local_dir().join("state")))
    }
}
