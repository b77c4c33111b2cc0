/*!
 * Logging and tracing initialization
 *
 * Results are printed on stdout, so console logs always go to stderr. A
 * configured log file receives JSON lines instead.
 */

use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::GeobatchConfig;
use crate::error::{GeobatchError, Result};

/// Where log records are written
#[derive(Debug)]
pub enum LogTarget {
    Stderr,
    File(File),
}

/// Level the crate logs at; `verbose` wins over `log_level`
pub fn effective_level(config: &GeobatchConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Default filter directive, used when `RUST_LOG` is unset
pub fn default_directive(config: &GeobatchConfig) -> String {
    format!("geobatch={}", effective_level(config).as_str().to_lowercase())
}

/// Open the configured log destination, truncating an existing log file
pub fn open_log_target(log_file: Option<&Path>) -> Result<LogTarget> {
    match log_file {
        None => Ok(LogTarget::Stderr),
        Some(path) => File::create(path).map(LogTarget::File).map_err(|e| {
            GeobatchError::Config(format!(
                "Failed to create log file {}: {}",
                path.display(),
                e
            ))
        }),
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails if the filter is invalid, the log file cannot be created, or a
/// subscriber is already installed.
pub fn init_logging(config: &GeobatchConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(config)))
        .map_err(|e| GeobatchError::Config(format!("Failed to create log filter: {}", e)))?;

    let (console, json) = match open_log_target(config.log_file.as_deref())? {
        LogTarget::Stderr => (
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_thread_names(true)
                    .compact(),
            ),
            None,
        ),
        LogTarget::File(file) => (
            None,
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_ansi(false)
                    .json(),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(json)
        .try_init()
        .map_err(|e| GeobatchError::Config(format!("Failed to install logger: {}", e)))
}

#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("geobatch=debug"));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_test_writer().compact())
            .try_init()
            .ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use tempfile::tempdir;

    fn config(log_level: LogLevel, verbose: bool) -> GeobatchConfig {
        GeobatchConfig {
            log_level,
            verbose,
            ..Default::default()
        }
    }

    #[test]
    fn test_verbose_forces_debug() {
        assert_eq!(effective_level(&config(LogLevel::Error, true)), Level::DEBUG);
        assert_eq!(effective_level(&config(LogLevel::Trace, true)), Level::DEBUG);
        assert_eq!(effective_level(&config(LogLevel::Warn, false)), Level::WARN);
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(&config(LogLevel::Info, false)), "geobatch=info");
        assert_eq!(default_directive(&config(LogLevel::Error, true)), "geobatch=debug");
        assert!(EnvFilter::try_new(default_directive(&config(LogLevel::Trace, false))).is_ok());
    }

    #[test]
    fn test_open_log_target() {
        assert!(matches!(open_log_target(None).unwrap(), LogTarget::Stderr));

        let dir = tempdir().unwrap();
        let path = dir.path().join("geobatch.log");
        assert!(matches!(
            open_log_target(Some(path.as_path())).unwrap(),
            LogTarget::File(_)
        ));
        assert!(path.exists());

        let missing = dir.path().join("no/such/dir/geobatch.log");
        assert!(matches!(
            open_log_target(Some(missing.as_path())),
            Err(GeobatchError::Config(_))
        ));
    }

    #[test]
    fn test_second_install_is_an_error() {
        init_test_logging();
        assert!(init_logging(&GeobatchConfig::default()).is_err());
    }
}
