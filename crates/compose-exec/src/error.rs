use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid process specification: {0}")]
    InvalidSpec(String),

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for child: {0}")]
    Wait(#[source] std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{command}' did not exit within {after:?}; killed")]
    Timeout { command: String, after: Duration },

    #[error("internal error: {0}")]
    Internal(String),
}
