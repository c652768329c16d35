use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("path has no final segment: {0}")]
    UnnamedRepository(String),

    #[error("invalid run stamp: {0}")]
    InvalidStamp(String),

    #[error("invalid flag value: {0} (expected: true|false|1|0|yes|no|on|off)")]
    InvalidFlag(String),

    #[error("illegal run transition: {from} -> {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },
}
