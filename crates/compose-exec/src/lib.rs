//! External process supervision for the compose pipeline.
//!
//! [`ProcessSupervisor`] runs one child process to completion while draining
//! stdout and stderr concurrently, reassembles the raw chunks into lines with
//! [`LineBuffer`], classifies each line with [`SeverityRules`] and forwards it
//! to an injected [`LineSink`].
mod error;
pub use error::ExecError;

mod line;
pub use line::{LineBuffer, LogLine, Stream};

mod severity;
pub use severity::{Severity, SeverityRules, StderrPolicy};

mod sink;
pub use sink::{LineSink, MemorySink, TracingSink};

mod process;
pub use process::{ExitReport, ProcessSpec, ProcessSupervisor};
