//! Logging setup for the CLI.
//!
//! Installs a global tracing subscriber writing to stderr so stdout stays
//! reserved for the job summary. `RUST_LOG` overrides the level chosen by the
//! command-line flags.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

static INITIALIZED: OnceLock<LogLevel> = OnceLock::new();

/// Verbosity selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Warnings and errors only
    Quiet,
    #[default]
    Normal,
    /// Debug output, including every logged metric
    Verbose,
}

impl LogLevel {
    /// Default filter directive when `RUST_LOG` is unset
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Quiet => "warn",
            LogLevel::Normal => "info",
            LogLevel::Verbose => "debug",
        }
    }
}

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize tracing to write to stderr.
///
/// Subsequent calls are no-ops.
pub fn init(level: LogLevel) -> Result<(), LoggingError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let subscriber = Registry::default().with(build_env_filter(level)).with(
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr),
    );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INITIALIZED.set(level);

    tracing::debug!("Logging initialized at {}", level.directive());
    Ok(())
}

fn build_env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_follow_verbosity() {
        assert_eq!(LogLevel::Quiet.directive(), "warn");
        assert_eq!(LogLevel::Normal.directive(), "info");
        assert_eq!(LogLevel::Verbose.directive(), "debug");
        assert_eq!(LogLevel::default(), LogLevel::Normal);
    }

    #[test]
    fn init_is_idempotent() {
        init(LogLevel::Quiet).unwrap();
        init(LogLevel::Verbose).unwrap();
    }
}
