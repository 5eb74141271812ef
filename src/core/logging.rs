//! Logging configuration and initialization

use clap::ValueEnum;
use tracing_subscriber::{fmt, EnvFilter};

/// Log line format on stderr
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Level from the verbosity flags
    pub fn from_flags(verbose: bool, quiet: bool, format: LogFormat) -> Self {
        let level = if verbose {
            "debug"
        } else if quiet {
            "error"
        } else {
            "warn"
        };
        Self {
            level: level.to_string(),
            format,
        }
    }

    /// `NR13_LOG`, then `RUST_LOG`, then the configured level
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env("NR13_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    /// Initialize the tracing subscriber, writing to stderr
    pub fn init(&self) {
        let filter = self.filter();

        match self.format {
            LogFormat::Json => {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            LogFormat::Pretty => {
                fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_flags() {
        assert_eq!(LoggingConfig::from_flags(true, false, LogFormat::Pretty).level, "debug");
        assert_eq!(LoggingConfig::from_flags(false, true, LogFormat::Pretty).level, "error");
        assert_eq!(LoggingConfig::default().level, "warn");
    }
}
