//! Subscriber setup for binaries embedding the worker.
//!
//! The filter comes from [`LogConfig::filter`] when set, then `RUST_LOG`,
//! then the configured level. `log` records from reqwest and hyper reach the
//! same subscriber through tracing-subscriber's `tracing-log` bridge.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::CaixaError;

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "CAIXA_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable.
    #[default]
    Pretty,
    Compact,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = CaixaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(CaixaError::InvalidArgument(format!(
                "unknown log format '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Print file and line of each event, and span enter/close events.
    pub verbose: bool,
    /// Directive string such as `caixa_sw=debug,reqwest=warn`.
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            verbose: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Debug level with locations and span events.
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            verbose: true,
            ..Self::default()
        }
    }

    /// JSON output at info level.
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            ..Self::default()
        }
    }

    /// Default configuration with the format taken from `CAIXA_LOG_FORMAT`.
    /// Unknown values are reported instead of silently ignored.
    pub fn from_env() -> Result<Self, CaixaError> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(LOG_FORMAT_ENV) {
            config.format = raw.parse()?;
        }
        Ok(config)
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let by_level = || EnvFilter::new(self.level.to_string());
        match self.filter.as_deref() {
            Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| by_level()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| by_level()),
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let spans = if self.verbose {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_target(true)
            .with_file(self.verbose)
            .with_line_number(self.verbose)
            .with_span_events(spans);

        match self.format {
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Compact => base.compact().boxed(),
            LogFormat::Json => base.json().boxed(),
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: LogConfig) -> Result<(), CaixaError> {
    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.env_filter())
        .try_init()
        .map_err(|e| CaixaError::internal(format!("failed to install subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_quiet_pretty_info() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.verbose);
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_presets() {
        let verbose = LogConfig::verbose();
        assert_eq!(verbose.level, Level::DEBUG);
        assert!(verbose.verbose);

        let production = LogConfig::production().with_filter("caixa_sw=debug");
        assert_eq!(production.format, LogFormat::Json);
        assert_eq!(production.filter.as_deref(), Some("caixa_sw=debug"));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Compact ".parse::<LogFormat>().unwrap(), LogFormat::Compact);

        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert_eq!(err.category(), "invalid_argument");
    }
}
