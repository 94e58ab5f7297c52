//! Multi-file logging.
//!
//! Besides the console, each component can write to its own rolling file so a
//! node's export traffic, read fan-out and ingest can be followed separately:
//!
//! | Log File         | Component               | Target Prefixes                                                      |
//! |------------------|-------------------------|----------------------------------------------------------------------|
//! | roomlog.log      | Root logger             | (all)                                                                |
//! | export.log       | Log export service      | roomlog_core::service::export, roomlog_server::startup::grpc          |
//! | aggregator.log   | Fan-out reads           | roomlog_core::service::aggregator, roomlog_core::service::peer_client |
//! | discovery.log    | Peer discovery          | roomlog_core::service::discovery                                     |
//! | ingest.log       | HTTP API                | roomlog_server::api, roomlog_core::service::message_log              |
//!
//! Files live in `~/roomlog/logs` by default.
//! Override with the `ROOMLOG_LOG_DIR` environment variable or `logs.path` config.
//! Files roll daily unless `logs.rotation` says `hourly` or `never`.

use std::{path::PathBuf, str::FromStr};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::{Filter, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use roomlog_common::RoomlogError;
use roomlog_core::Configuration;

const ROOT_LOG_FILE: &str = "roomlog.log";

struct ComponentLogDef {
    file_name: &'static str,
    targets: &'static [&'static str],
}

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "export.log",
        targets: &[
            "roomlog_core::service::export",
            "roomlog_server::startup::grpc",
        ],
    },
    ComponentLogDef {
        file_name: "aggregator.log",
        targets: &[
            "roomlog_core::service::aggregator",
            "roomlog_core::service::peer_client",
        ],
    },
    ComponentLogDef {
        file_name: "discovery.log",
        targets: &["roomlog_core::service::discovery"],
    },
    ComponentLogDef {
        file_name: "ingest.log",
        targets: &["roomlog_server::api", "roomlog_core::service::message_log"],
    },
];

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

impl FromStr for LogRotation {
    type Err = RoomlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(LogRotation::Daily),
            "hourly" => Ok(LogRotation::Hourly),
            "never" => Ok(LogRotation::Never),
            other => Err(RoomlogError::ConfigError(format!(
                "unknown log rotation '{}'",
                other
            ))),
        }
    }
}

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{}/roomlog/logs", home))
}

/// Logging configuration for the entire application.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub console_level: Level,
    pub file_logging: bool,
    pub file_level: Level,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            console_output: true,
            console_level: Level::INFO,
            file_logging: false,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Create from application configuration.
    ///
    /// `ROOMLOG_LOG_DIR` and `ROOMLOG_LOG_LEVEL` win over the config file.
    pub fn from_configuration<F>(configuration: &Configuration, env_lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_dir = env_lookup("ROOMLOG_LOG_DIR")
            .or_else(|| configuration.logs_path())
            .map(PathBuf::from)
            .unwrap_or_else(default_log_dir);

        let level = env_lookup("ROOMLOG_LOG_LEVEL")
            .unwrap_or_else(|| configuration.logs_level())
            .parse()
            .unwrap_or(Level::INFO);

        Self {
            log_dir,
            console_output: configuration.logs_console(),
            console_level: level,
            file_logging: configuration.logs_file(),
            file_level: level,
            rotation: configuration
                .logs_rotation()
                .parse()
                .unwrap_or(LogRotation::Daily),
        }
    }
}

/// Keeps the non-blocking file writers alive; buffered output is flushed on drop.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

fn file_layer<F>(
    config: &LoggingConfig,
    file_name: &str,
    filter: F,
    guards: &mut Vec<WorkerGuard>,
) -> Box<dyn Layer<Registry> + Send + Sync>
where
    F: Filter<Registry> + Send + Sync + 'static,
{
    let appender = RollingFileAppender::new(config.rotation.into(), &config.log_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);

    Box::new(
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_filter(filter),
    )
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` controls the console and root file levels. Component files
/// capture everything from their targets.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(filter);
        layers.push(Box::new(console_layer));
    }

    if config.file_logging {
        let root_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.file_level.to_string()));
        layers.push(file_layer(config, ROOT_LOG_FILE, root_filter, &mut guards));

        for component in COMPONENT_LOGS {
            let mut targets = Targets::new();
            for target in component.targets {
                targets = targets.with_target(*target, LevelFilter::TRACE);
            }
            layers.push(file_layer(config, component.file_name, targets, &mut guards));
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::info!(
            log_dir = %config.log_dir.display(),
            component_files = COMPONENT_LOGS.len(),
            "File logging initialized"
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}
