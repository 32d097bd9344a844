//! Per-book scratch directory.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// A private directory for one book's intermediate files.
///
/// The directory is removed when this value drops, on every exit path,
/// unless it was created with `keep` set.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
    keep: bool,
}

impl WorkDir {
    /// Create a fresh directory under the system temporary directory.
    pub fn new(name: &str, keep: bool) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("folio-{name}-"))
            .keep(keep)
            .tempdir()?;
        log::debug!("working in {}", dir.path().display());
        Ok(Self { dir, keep })
    }

    /// Create a fresh directory inside `parent`.
    pub fn new_in(parent: &Path, name: &str, keep: bool) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("folio-{name}-"))
            .keep(keep)
            .tempdir_in(parent)?;
        log::debug!("working in {}", dir.path().display());
        Ok(Self { dir, keep })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the directory. Nothing is created.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `data` to `name`, replacing any earlier contents.
    pub fn save(&self, name: &str, data: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.file(name);
        fs::write(&path, data)?;
        Ok(path)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.keep {
            return;
        }
        let names: Vec<String> = fs::read_dir(self.dir.path())
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        log::info!(
            "NOT removing {}, containing: {}",
            self.dir.path().display(),
            names.join(" ")
        );
    }
}
