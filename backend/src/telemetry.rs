//! Tracing subscriber setup.

use std::str::FromStr;

use tracing_subscriber::{EnvFilter, fmt};

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable `fmt` output.
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(TelemetryError::Format {
                value: value.to_owned(),
            }),
        }
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The log format is neither `text` nor `json`.
    #[error("unknown log format {value:?}")]
    Format {
        /// Rejected value.
        value: String,
    },
    /// The level could not be turned into a filter directive.
    #[error("invalid log level {level:?}")]
    Level {
        /// Rejected level.
        level: String,
        /// Parser failure.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// A global subscriber was already installed.
    #[error("tracing init failed: {message}")]
    Init {
        /// Subscriber error text.
        message: String,
    },
}

/// Filter seeded from `level`; a set `RUST_LOG` takes precedence.
///
/// # Errors
/// Returns [`TelemetryError::Level`] when `level` is not a valid directive.
pub fn env_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|source| TelemetryError::Level {
        level: level.to_owned(),
        source,
    })
}

/// Install the global subscriber.
///
/// # Errors
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init(level: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let filter = env_filter(level)?;
    let result = match format {
        LogFormat::Text => fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => fmt().with_env_filter(filter).json().try_init(),
    };
    result.map_err(|err| TelemetryError::Init {
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use env_lock::lock_env;
    use rstest::rstest;

    #[rstest]
    #[case("text", LogFormat::Text)]
    #[case("JSON", LogFormat::Json)]
    #[case(" json ", LogFormat::Json)]
    fn parses_formats(#[case] raw: &str, #[case] expected: LogFormat) {
        assert_eq!(raw.parse::<LogFormat>().expect("known format"), expected);
    }

    #[rstest]
    fn rejects_unknown_formats() {
        assert!(matches!(
            "yaml".parse::<LogFormat>(),
            Err(TelemetryError::Format { .. })
        ));
    }

    #[rstest]
    fn rust_log_overrides_the_configured_level() {
        let _guard = lock_env([("RUST_LOG", Some("warn"))]);
        let filter = env_filter("debug").expect("valid filter");
        assert_eq!(filter.to_string(), "warn");
    }

    #[rstest]
    fn configured_level_applies_without_rust_log() {
        let _guard = lock_env([("RUST_LOG", None::<&str>)]);
        let filter = env_filter("debug").expect("valid filter");
        assert_eq!(filter.to_string(), "debug");
    }
}
