mod domain;
pub use domain::{Flag, Repository, RunStamp, LATEST_POINTER};

mod error;
pub use error::ModelError;

mod run;
pub use run::{ComposeRun, RunStatus};
