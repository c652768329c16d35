use std::{path::Path, path::PathBuf, time::Duration};

use compose_exec::{ProcessSpec, StderrPolicy};
use compose_model::Repository;

pub(crate) const BUILDER_TOOL: &str = "appstream-builder";

/// Veto classes the builder reports that must not drop a component.
const VETO_IGNORE: [&str; 2] = ["missing-parents", "missing-info"];

/// Fixed command line of the metadata builder.
#[derive(Debug, Clone)]
pub struct BuilderCommand {
    pub(crate) program: String,
    pub(crate) origin: String,
    pub(crate) temp_root: PathBuf,
    pub(crate) timeout: Option<Duration>,
}

impl BuilderCommand {
    /// Invocation for `repo` writing into `run_dir`, reusing metadata from `previous`.
    pub fn spec(&self, repo: &Repository, run_dir: &Path, previous: &Path) -> ProcessSpec {
        let name = repo.name();
        ProcessSpec::new(name, BUILDER_TOOL, self.program.as_str())
            .arg("--verbose")
            .args(VETO_IGNORE.map(|class| format!("--veto-ignore={class}")))
            .arg("--output-dir")
            .arg(run_dir.join("appstream"))
            .arg("--temp-dir")
            .arg(self.temp_root.join(name))
            .arg("--icons-dir")
            .arg(run_dir.join("icons"))
            .arg("--cache-dir")
            .arg(run_dir.join("cache"))
            .arg("--basename")
            .arg(name)
            .arg("--log-dir")
            .arg(run_dir.join("logs"))
            .arg("--include-failed")
            .arg("--origin")
            .arg(&self.origin)
            .arg("--packages-dir")
            .arg(repo.path())
            .arg("--old-metadata")
            .arg(previous.join("appstream"))
            .stderr(StderrPolicy::Classify)
            .timeout(self.timeout)
    }
}
