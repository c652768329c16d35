//! Fixtures shared by the pipeline and scheduler tests: a base/output tree and
//! stand-in executables for the metadata builder and `tar`.
use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use tempfile::TempDir;
use time::macros::datetime;

use compose_exec::LineSink;
use compose_model::Repository;

use crate::{clock::ManualClock, config::ComposeConfig, pipeline::Pipeline};

/// Parses the builder flags, fakes its output layout, and reacts to marker
/// files in the packages directory: `SLEEP` (seconds), `FAIL`, `screens/<sub>`.
const FAKE_BUILDER: &str = r#"#!/bin/sh
all="$*"
while [ $# -gt 0 ]; do
  case "$1" in
    --output-dir) out="$2"; shift ;;
    --icons-dir) icons="$2"; shift ;;
    --packages-dir) pkgs="$2"; shift ;;
    --basename) name="$2"; shift ;;
  esac
  shift
done
mkdir -p "$out" "$icons"
echo "$all" > "$out/args"
if [ -f "$pkgs/SLEEP" ]; then sleep "$(cat "$pkgs/SLEEP")"; fi
echo "INFO: composing $name"
if [ -f "$pkgs/FAIL" ]; then
  echo "ERROR: broken repo" >&2
  exit 1
fi
for d in "$pkgs"/screens/*; do
  if [ -d "$d" ]; then mkdir -p "$icons/$(basename "$d")"; fi
done
echo "<components/>" > "$out/$name.xml"
printf 'partial line'
"#;

/// Writes the source directory into the archive path instead of compressing it.
const FAKE_TAR: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    -C) dir="$2"; shift ;;
    -czf) file="$2"; shift ;;
  esac
  shift
done
[ -d "$dir" ] || exit 2
echo "$dir" > "$file"
"#;

struct Tools {
    _dir: TempDir,
    builder: PathBuf,
    tar: PathBuf,
}

/// Scripts are written once per test binary; rewriting an executable while
/// other threads fork can fail the spawn with ETXTBSY.
fn tools() -> &'static Tools {
    static TOOLS: OnceLock<Tools> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let builder = write_script(dir.path(), "appstream-builder", FAKE_BUILDER);
        let tar = write_script(dir.path(), "tar", FAKE_TAR);
        Tools {
            _dir: dir,
            builder,
            tar,
        }
    })
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub(crate) struct Fixture {
    tmp: TempDir,
    clock: Arc<ManualClock>,
}

impl Fixture {
    /// Creates `base/<repo>` for every name; the clock starts at 2024-01-01 00:00.
    pub(crate) fn new(repos: &[&str]) -> Self {
        let tmp = TempDir::new().unwrap();
        for name in repos {
            fs::create_dir_all(tmp.path().join("base").join(name)).unwrap();
        }
        fs::create_dir_all(tmp.path().join("out")).unwrap();
        Self {
            tmp,
            clock: Arc::new(ManualClock::new(datetime!(2024-01-01 00:00 UTC))),
        }
    }

    pub(crate) fn base(&self) -> PathBuf {
        self.tmp.path().join("base")
    }

    pub(crate) fn out(&self) -> PathBuf {
        self.tmp.path().join("out")
    }

    pub(crate) fn temp_root(&self) -> PathBuf {
        self.tmp.path().join("scratch")
    }

    pub(crate) fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub(crate) fn repo(&self, name: &str) -> Repository {
        Repository::from_path(self.base().join(name)).unwrap()
    }

    pub(crate) fn mark_failing(&self, name: &str) {
        fs::write(self.base().join(name).join("FAIL"), "").unwrap();
    }

    pub(crate) fn mark_slow(&self, name: &str, secs: f32) {
        fs::write(self.base().join(name).join("SLEEP"), secs.to_string()).unwrap();
    }

    pub(crate) fn add_screenshots(&self, name: &str, subdirs: &[&str]) {
        for sub in subdirs {
            fs::create_dir_all(self.base().join(name).join("screens").join(sub)).unwrap();
        }
    }

    pub(crate) fn config(&self) -> ComposeConfig {
        let tools = tools();
        let mut cfg = ComposeConfig::new(self.base(), self.out());
        cfg.builder = tools.builder.display().to_string();
        cfg.archiver = tools.tar.display().to_string();
        cfg.temp_root = self.temp_root();
        cfg
    }

    pub(crate) fn pipeline(&self, sink: Arc<dyn LineSink>) -> Pipeline {
        self.pipeline_with(&self.config(), sink)
    }

    pub(crate) fn pipeline_with(&self, cfg: &ComposeConfig, sink: Arc<dyn LineSink>) -> Pipeline {
        Pipeline::new(cfg, sink, self.clock.clone())
    }

    /// Run directory names under `out/<repo>`, sorted, without `latest`.
    pub(crate) fn runs(&self, name: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.out().join(name))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n != "latest")
            .collect();
        names.sort();
        names
    }
}
