//! Utilities for logging.
use std::sync::Once;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::{MakeWriter, TestWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One json object per event.
    Json,
    /// Multi-line output including file and line number.
    #[default]
    HumanReadable,
    /// Single line output.
    Compact,
}

/// Configure the global logger.
///
/// `RUST_LOG` takes precedence over `default_level` when set. Errors if a
/// global subscriber was already installed.
pub fn try_configure_global_logger<W>(
    default_level: Level,
    format: LogFormat,
    make_writer: W,
) -> Result<(), SetGlobalDefaultError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let env_filter = env_filter(default_level);

    match format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_writer(make_writer)
                .with_env_filter(env_filter)
                .with_span_events(FmtSpan::CLOSE)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::HumanReadable => {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(make_writer)
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::fmt()
                .compact()
                .with_writer(make_writer)
                .with_env_filter(env_filter)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    }
}

/// Initialize a logger for tests.
///
/// Safe to call from many tests, only the first call installs anything.
pub fn init_test() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Another test harness may have beaten us to it.
        let _ = try_configure_global_logger(
            Level::DEBUG,
            LogFormat::HumanReadable,
            TestWriter::new(),
        );
    });
}

fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(default_level).into())
        .from_env_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_test_is_idempotent() {
        init_test();
        init_test();
        tracing::debug!("logger initialized");
    }

    #[test]
    fn configure_twice_fails() {
        init_test();
        for format in [LogFormat::Json, LogFormat::HumanReadable, LogFormat::Compact] {
            try_configure_global_logger(Level::INFO, format, std::io::sink).unwrap_err();
        }
    }

    #[test]
    fn default_format() {
        assert_eq!(LogFormat::HumanReadable, LogFormat::default());
    }
}
