mod config;
mod error;
mod logger;
mod object;

pub use config::LoggerConfig;
pub use error::{LoggerError, LoggerResult};
pub use object::LoggerFormat;
pub use object::LoggerLevel;
pub use object::{LoggerTimeZone, init_local_offset, local_offset, now_local};

/// Installs the global tracing subscriber described by `cfg`.
///
/// Must be called once; a second call returns [`LoggerError::AlreadyInitialized`].
///
/// # Important: Local Timezone
/// With `LoggerTimeZone::Local`, call [`init_local_offset`] in `main()` before
/// the tokio runtime (or any other thread) is started.
///
/// # Examples
/// ```rust
/// use compose_observe::{LoggerConfig, init_logger};
///
/// let config = LoggerConfig::default();
/// init_logger(&config).expect("logger must initialize once");
/// tracing::info!("logger initialized");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => logger::logger_text(cfg),
        LoggerFormat::Json => logger::logger_json(cfg),
        LoggerFormat::Journald => logger::logger_journald(cfg),
    }
}
