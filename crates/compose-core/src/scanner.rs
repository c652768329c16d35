//! Discovery of repositories under the base directory.
use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

use compose_model::Repository;

use crate::error::ScanError;

/// Lists the immediate subdirectories of a base directory as repositories.
#[derive(Debug, Clone)]
pub struct RepositoryScanner {
    base_dir: PathBuf,
    exclude: PathBuf,
}

impl RepositoryScanner {
    /// `exclude` is the output root; it is skipped even when it lives under `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, exclude: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            exclude: exclude.into(),
        }
    }

    /// Opens the base directory.
    ///
    /// Failing to open it is fatal for the whole run. The returned iterator is
    /// lazy and yields in filesystem order.
    pub fn scan(&self) -> Result<RepositoryScan, ScanError> {
        let base = absolute(&self.base_dir);
        let entries = fs::read_dir(&base).map_err(|source| ScanError::Open {
            path: base.clone(),
            source,
        })?;

        let mut exclude = vec![absolute(&self.exclude)];
        if let Ok(canonical) = fs::canonicalize(&self.exclude) {
            exclude.push(canonical);
        }
        debug!(base = %base.display(), exclude = ?exclude, "scanning for repositories");

        Ok(RepositoryScan {
            base,
            entries,
            exclude,
        })
    }
}

/// Lazy, finite sequence of repositories found by [`RepositoryScanner::scan`].
#[derive(Debug)]
pub struct RepositoryScan {
    base: PathBuf,
    entries: fs::ReadDir,
    exclude: Vec<PathBuf>,
}

impl RepositoryScan {
    fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude.iter().any(|e| e == path) {
            return true;
        }
        fs::canonicalize(path)
            .map(|c| self.exclude.contains(&c))
            .unwrap_or(false)
    }
}

impl Iterator for RepositoryScan {
    type Item = Result<Repository, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(source) => {
                    return Some(Err(ScanError::Entry {
                        path: self.base.clone(),
                        source,
                    }));
                }
            };
            let path = entry.path();

            // Follows symlinks; unreadable entries count as non-directories.
            if !fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false) {
                trace!(path = %path.display(), "skipping non-directory entry");
                continue;
            }
            if self.is_excluded(&path) {
                debug!(path = %path.display(), "skipping output directory");
                continue;
            }
            return Some(Repository::from_path(path).map_err(ScanError::from));
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
