mod flag;
pub use flag::Flag;

mod repository;
pub use repository::Repository;

mod stamp;
pub use stamp::RunStamp;

/// Name of the per-repository symlink pointing at the newest published run.
pub const LATEST_POINTER: &str = "latest";
