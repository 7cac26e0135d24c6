use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::error::ExtractError;
use crate::is_image_path;

/// Every recognised image file below `root`.
pub(crate) fn collect_images(root: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            ExtractError::Io {
                path,
                source: err.into(),
            }
        })?;
        if entry.file_type().is_file() && is_image_path(entry.path()) {
            pages.push(entry.into_path());
        }
    }
    Ok(pages)
}

/// Empties `root` so a fallback extractor starts from a clean directory.
pub(crate) fn clear_dir(root: &Path) -> io::Result<()> {
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn collects_nested_images_only() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/2.PNG"), b"x").unwrap();
        fs::write(dir.path().join("1.jpeg"), b"x").unwrap();
        fs::write(dir.path().join("info.xml"), b"x").unwrap();
        fs::create_dir_all(dir.path().join("dir.png")).unwrap();

        let mut found = collect_images(dir.path()).unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![dir.path().join("1.jpeg"), dir.path().join("a/b/2.PNG")]
        );

        clear_dir(dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
