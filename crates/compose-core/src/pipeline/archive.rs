use std::{
    ffi::{OsStr, OsString},
    fs,
    path::Path,
    time::Duration,
};

use compose_exec::{ProcessSpec, Severity, StderrPolicy};
use compose_model::Repository;

pub(crate) const ARCHIVER_TOOL: &str = "tar";

/// Tarball command for one screenshot directory.
#[derive(Debug, Clone)]
pub struct ArchiveCommand {
    pub(crate) program: String,
    pub(crate) timeout: Option<Duration>,
}

impl ArchiveCommand {
    /// File name of the archive for icon subdirectory `subdir`.
    pub fn archive_name(repo: &str, subdir: &OsStr) -> OsString {
        let mut name = OsString::from(format!("{repo}-icons-"));
        name.push(subdir);
        name.push(".tar.gz");
        name
    }

    /// `tar -C <source> -czf <archive> . --strip-components=2`
    pub fn spec(&self, repo: &Repository, source: &Path, archive: &Path) -> ProcessSpec {
        ProcessSpec::new(repo.name(), ARCHIVER_TOOL, self.program.as_str())
            .arg("-C")
            .arg(source)
            .arg("-czf")
            .arg(archive)
            .arg(".")
            .arg("--strip-components=2")
            .stderr(StderrPolicy::Uniform(Severity::Error))
            .timeout(self.timeout)
    }
}

/// Directories directly under `icons_dir`, sorted by name.
///
/// Non-directory entries are returned separately so the caller can log them.
pub(crate) fn icon_subdirs(icons_dir: &Path) -> std::io::Result<(Vec<OsString>, Vec<OsString>)> {
    let mut dirs = Vec::new();
    let mut skipped = Vec::new();
    for entry in fs::read_dir(icons_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if entry.path().is_dir() {
            dirs.push(name);
        } else {
            skipped.push(name);
        }
    }
    dirs.sort();
    Ok((dirs, skipped))
}
