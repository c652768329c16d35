mod spec;
pub use spec::ProcessSpec;

mod supervisor;
pub use supervisor::{ExitReport, ProcessSupervisor};
