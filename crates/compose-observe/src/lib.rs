//! Logging setup for the compose orchestrator.
//!
//! Installs a global `tracing` subscriber (text, JSON or journald) and owns
//! the cached local UTC offset used for log timestamps and run stamps.
mod logger;
pub use logger::*;
