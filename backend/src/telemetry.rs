//! Tracing subscriber setup shared by the binaries.

use std::str::FromStr;

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// Output format for log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human readable multi-line output.
    Pretty,
}

/// Error returned when parsing an unknown [`LogFormat`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log format `{0}`; expected `json` or `pretty`")]
pub struct UnknownLogFormat(String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(UnknownLogFormat(raw.to_owned())),
        }
    }
}

/// Install the global subscriber, filtered by `RUST_LOG`.
///
/// A second call leaves the first subscriber in place and logs a warning.
pub fn init_tracing(format: LogFormat) {
    let builder = fmt().with_env_filter(EnvFilter::from_default_env());
    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    if let Err(error) = result {
        warn!(%error, "tracing subscriber already initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case(" Pretty ", LogFormat::Pretty)]
    fn parses_known_formats(#[case] raw: &str, #[case] expected: LogFormat) {
        assert_eq!(raw.parse::<LogFormat>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_formats() {
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[rstest]
    fn repeated_initialisation_is_harmless() {
        init_tracing(LogFormat::Json);
        init_tracing(LogFormat::Pretty);
    }
}
