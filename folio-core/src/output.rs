use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;
use walkdir::WalkDir;

/// Empty file at the output root telling GitHub Pages not to run Jekyll.
pub const MARKER_FILE: &str = ".nojekyll";

/// Static assets land here, relative to the output root.
pub const STATIC_PREFIX: &str = "static";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Writes the rendered site below one root directory.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Empty the output directory.
    ///
    /// If the tree cannot be removed in one go, whatever can be deleted is
    /// deleted and the rest is left behind with a warning. Only failing to
    /// recreate the root is an error.
    pub fn reset(&self) -> Result<(), OutputError> {
        if self.root.exists() {
            if let Err(e) = fs::remove_dir_all(&self.root) {
                warn!(
                    "Could not remove {} ({}), cleaning up what we can",
                    self.root.display(),
                    e
                );
                self.remove_children();
            }
        }

        fs::create_dir_all(&self.root).map_err(|source| OutputError::CreateDir {
            path: self.root.clone(),
            source,
        })
    }

    fn remove_children(&self) {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = result {
                warn!("Leaving {} in place: {}", path.display(), e);
            }
        }
    }

    /// Write `html` to `relative` below the root, creating parent
    /// directories and replacing any existing file.
    pub fn write_page(&self, relative: &Path, html: &str) -> Result<PathBuf, OutputError> {
        let path = self.root.join(relative);
        ensure_parent(&path)?;
        fs::write(&path, html).map_err(|source| OutputError::Write {
            path: path.clone(),
            source,
        })?;

        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Copy `static_dir` recursively to `<root>/static`. Returns the
    /// number of files copied; a missing directory copies nothing.
    pub fn copy_static(&self, static_dir: &Path) -> Result<usize, OutputError> {
        if !static_dir.is_dir() {
            debug!("No static directory at {}", static_dir.display());
            return Ok(0);
        }

        let target_root = self.root.join(STATIC_PREFIX);
        let mut copied = 0;

        for entry in WalkDir::new(static_dir).sort_by_file_name() {
            let entry = entry.map_err(|source| OutputError::Walk {
                path: static_dir.to_path_buf(),
                source,
            })?;

            let Ok(relative) = entry.path().strip_prefix(static_dir) else {
                continue;
            };
            let target = target_root.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|source| OutputError::CreateDir {
                    path: target.clone(),
                    source,
                })?;
            } else {
                ensure_parent(&target)?;
                fs::copy(entry.path(), &target).map_err(|source| OutputError::Copy {
                    from: entry.path().to_path_buf(),
                    to: target.clone(),
                    source,
                })?;
                copied += 1;
            }
        }

        Ok(copied)
    }

    /// Create the empty [`MARKER_FILE`] at the root.
    pub fn touch_marker(&self) -> Result<(), OutputError> {
        let path = self.root.join(MARKER_FILE);
        fs::write(&path, b"").map_err(|source| OutputError::Write { path, source })
    }
}

fn ensure_parent(path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| OutputError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_and_recreates() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");
        fs::create_dir_all(root.join("old/deep")).unwrap();
        fs::write(root.join("old/deep/stale.html"), "stale").unwrap();

        let writer = OutputWriter::new(&root);
        writer.reset().unwrap();

        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn test_reset_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path().join("a/b"));
        writer.reset().unwrap();
        assert!(writer.root().is_dir());
    }

    #[test]
    fn test_write_page_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());

        let path = writer.write_page(Path::new("tags/rust.html"), "one").unwrap();
        writer.write_page(Path::new("tags/rust.html"), "two").unwrap();

        assert_eq!(path, dir.path().join("tags/rust.html"));
        assert_eq!(fs::read_to_string(path).unwrap(), "two");
    }

    #[test]
    fn test_copy_static() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        fs::create_dir_all(assets.join("css")).unwrap();
        fs::create_dir_all(assets.join("empty")).unwrap();
        fs::write(assets.join("css/site.css"), "body{}").unwrap();
        fs::write(assets.join("favicon.ico"), [0u8, 1, 2]).unwrap();

        let writer = OutputWriter::new(dir.path().join("out"));
        let copied = writer.copy_static(&assets).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("out/static/css/site.css")).unwrap(),
            "body{}"
        );
        assert!(dir.path().join("out/static/empty").is_dir());
    }

    #[test]
    fn test_copy_missing_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        assert_eq!(writer.copy_static(&dir.path().join("nope")).unwrap(), 0);
    }

    #[test]
    fn test_touch_marker() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        writer.touch_marker().unwrap();

        let marker = dir.path().join(MARKER_FILE);
        assert_eq!(fs::metadata(marker).unwrap().len(), 0);
    }
}
