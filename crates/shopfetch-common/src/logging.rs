//! Logging bootstrap
//!
//! Centralized tracing setup for all shopfetch binaries. Library code never
//! prints; it emits structured `tracing` events and the binary decides where
//! they go. Configuration comes from environment variables:
//!
//! - `LOG_LEVEL`: trace | debug | info | warn | error (default: info)
//! - `LOG_FORMAT`: text | json (default: text)
//! - `LOG_OUTPUT`: console | file | both (default: console)
//! - `LOG_DIR`: directory for rotated log files (default: ./logs)
//! - `LOG_FILTER`: extra filter directives, e.g. "sqlx=warn,hyper=warn"

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Log destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl std::str::FromStr for LogOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            _ => Err(anyhow::anyhow!("Invalid log output: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level directive, e.g. "info".
    pub level: String,
    /// Emit JSON instead of human-readable text.
    pub json: bool,
    pub output: LogOutput,
    pub log_dir: PathBuf,
    /// File name prefix for daily-rotated log files.
    pub file_prefix: String,
    /// Extra comma-separated filter directives appended to the base level.
    pub extra_directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            output: LogOutput::Console,
            log_dir: PathBuf::from("./logs"),
            file_prefix: "shopfetch".to_string(),
            extra_directives: None,
        }
    }
}

impl LogConfig {
    /// Load configuration from `LOG_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.json = format.eq_ignore_ascii_case("json");
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            config.output = output.parse()?;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Ok(filter) = std::env::var("LOG_FILTER") {
            config.extra_directives = Some(filter);
        }

        Ok(config)
    }

    fn filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .with_context(|| format!("Invalid LOG_LEVEL: {}", self.level))?;
        if let Some(ref directives) = self.extra_directives {
            for directive in directives.split(',') {
                filter = filter.add_directive(
                    directive
                        .trim()
                        .parse()
                        .with_context(|| format!("Invalid filter directive: {}", directive))?,
                );
            }
        }
        Ok(filter)
    }
}

/// Install the global tracing subscriber. Call once at binary startup.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = config.filter()?;

    let console_layer = match config.output {
        LogOutput::Console | LogOutput::Both => {
            let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
            Some(if config.json {
                layer.json().boxed()
            } else {
                layer.boxed()
            })
        }
        LogOutput::File => None,
    };

    let file_layer = match config.output {
        LogOutput::File | LogOutput::Both => {
            std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;
            let appender =
                tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // The guard flushes on drop; it must outlive the process.
            std::mem::forget(guard);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            Some(if config.json {
                layer.json().boxed()
            } else {
                layer.boxed()
            })
        }
        LogOutput::Console => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_output_from_str() {
        assert_eq!("console".parse::<LogOutput>().unwrap(), LogOutput::Console);
        assert_eq!("FILE".parse::<LogOutput>().unwrap(), LogOutput::File);
        assert_eq!("both".parse::<LogOutput>().unwrap(), LogOutput::Both);
        assert!("syslog".parse::<LogOutput>().is_err());
    }

    #[test]
    fn test_filter_rejects_garbage_directives() {
        let config = LogConfig {
            extra_directives: Some("=&&=".to_string()),
            ..Default::default()
        };
        assert!(config.filter().is_err());
    }

    #[test]
    fn test_filter_accepts_module_directives() {
        let config = LogConfig {
            extra_directives: Some("sqlx=warn, hyper=warn".to_string()),
            ..Default::default()
        };
        assert!(config.filter().is_ok());
    }
}
