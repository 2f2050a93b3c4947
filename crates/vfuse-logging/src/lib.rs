//! Process-wide `tracing` setup for the relay binaries.

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Hourly,
    Daily,
    Never,
}

impl From<Rotation> for rolling::Rotation {
    fn from(r: Rotation) -> Self {
        match r {
            Rotation::Hourly => rolling::Rotation::HOURLY,
            Rotation::Daily => rolling::Rotation::DAILY,
            Rotation::Never => rolling::Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive (`info`, `vfuse_net=debug,info`, ...). `RUST_LOG`
    /// takes precedence when set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for log files. No file logging when absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_prefix")]
    pub file_prefix: String,

    #[serde(default)]
    pub rotation: Rotation,

    #[serde(default)]
    pub json_format: bool,

    /// Also write to stderr.
    #[serde(default = "default_true")]
    pub console_output: bool,
}

fn default_level() -> String {
    "info".into()
}

fn default_prefix() -> String {
    "vfuse".into()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_level(),
            log_dir: None,
            file_prefix: default_prefix(),
            rotation: Rotation::default(),
            json_format: false,
            console_output: true,
        }
    }
}

impl LogConfig {
    /// Raise the level for each `-v` given on the command line. Zero keeps
    /// the configured level.
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        match verbose {
            0 => {}
            1 => self.level = "debug".into(),
            _ => self.level = "trace".into(),
        }
        self
    }

    fn env_filter(&self) -> anyhow::Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level)
                .with_context(|| format!("invalid log level {:?}", self.level)),
        }
    }
}

type BoxedLayer<S> = Box<dyn tracing_subscriber::Layer<S> + Send + Sync>;

/// Install the global subscriber. Call once at startup and hold the returned
/// guard until exit, or buffered file output is lost.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry().with(config.env_filter()?);

    let console_layer: Option<BoxedLayer<_>> = if config.console_output {
        let layer = fmt::layer().with_writer(std::io::stderr);
        if config.json_format {
            Some(Box::new(layer.json()))
        } else {
            Some(Box::new(layer))
        }
    } else {
        None
    };

    let (file_layer, guard): (Option<BoxedLayer<_>>, Option<WorkerGuard>) =
        match &config.log_dir {
            Some(log_dir) => {
                let appender = rolling::RollingFileAppender::builder()
                    .rotation(config.rotation.into())
                    .filename_prefix(&config.file_prefix)
                    .filename_suffix("log")
                    .build(log_dir)
                    .with_context(|| format!("creating log appender in {}", log_dir.display()))?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer().with_ansi(false).with_writer(writer);
                let layer: BoxedLayer<_> = if config.json_format {
                    Box::new(layer.json())
                } else {
                    Box::new(layer)
                };
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

    registry
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = LogConfig::default();
        assert_eq!(cfg.level, "info");
        assert_eq!(cfg.file_prefix, "vfuse");
        assert_eq!(cfg.rotation, Rotation::Hourly);
        assert!(cfg.console_output);
        assert!(cfg.log_dir.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let cfg: LogConfig = toml::from_str(
            r#"
            level = "vfuse_net=trace,warn"
            log_dir = "/var/log/vfuse"
            rotation = "daily"
            json_format = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.level, "vfuse_net=trace,warn");
        assert_eq!(cfg.rotation, Rotation::Daily);
        assert!(cfg.json_format);
        assert!(cfg.console_output);
        assert_eq!(cfg.file_prefix, "vfuse");
    }

    #[test]
    fn test_unknown_rotation_rejected() {
        assert!(toml::from_str::<LogConfig>(r#"rotation = "weekly""#).is_err());
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(LogConfig::default().with_verbosity(0).level, "info");
        assert_eq!(LogConfig::default().with_verbosity(1).level, "debug");
        assert_eq!(LogConfig::default().with_verbosity(3).level, "trace");
    }

    #[test]
    fn test_file_logging_init() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LogConfig {
            log_dir: Some(dir.path().to_path_buf()),
            console_output: false,
            ..Default::default()
        };
        let guard = init_logging(&cfg).unwrap();
        assert!(guard.is_some());
        info!("written to file");
        drop(guard);

        // Only one subscriber per process.
        assert!(init_logging(&cfg).is_err());
    }
}
