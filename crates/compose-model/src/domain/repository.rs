use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::ModelError;

/// One input directory, treated as an independent unit of work.
///
/// Identified by its path; the name is the final path segment and doubles as
/// the key of the repository's subtree under the output root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    path: PathBuf,
    name: String,
}

impl Repository {
    /// Build a repository from its source path.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ModelError> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ModelError::UnnamedRepository(path.display().to_string()))?;
        Ok(Self { path, name })
    }

    /// Source path of the repository.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_final_segment() {
        let repo = Repository::from_path("/srv/repos/terra-40").unwrap();
        assert_eq!(repo.name(), "terra-40");
        assert_eq!(repo.path(), Path::new("/srv/repos/terra-40"));
    }

    #[test]
    fn trailing_separator_is_ignored() {
        let repo = Repository::from_path("/srv/repos/extras/").unwrap();
        assert_eq!(repo.name(), "extras");
    }

    #[test]
    fn root_has_no_name() {
        assert!(Repository::from_path("/").is_err());
        assert!(Repository::from_path("..").is_err());
    }
}
