use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "student-analyzer.log";

/// Keeps the background log writer alive; drop it only at shutdown.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Where log output goes besides stdout.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub filter: String,
    pub file_dir: Option<PathBuf>,
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            "never" => Some(Self::Never),
            _ => None,
        }
    }

    fn to_appender(self) -> Rotation {
        match self {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

impl LogSettings {
    /// `ENABLE_FILE_LOGS` turns on the file sink under `LOG_DIR` (default
    /// `./logs`), rotated per `LOG_ROTATION`.
    pub fn from_env(filter: &str) -> Self {
        let file_enabled = std::env::var("ENABLE_FILE_LOGS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let file_dir = file_enabled.then(|| {
            std::env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./logs"))
        });
        let rotation = std::env::var("LOG_ROTATION")
            .ok()
            .as_deref()
            .and_then(LogRotation::parse)
            .unwrap_or(LogRotation::Daily);

        Self {
            filter: filter.to_string(),
            file_dir,
            rotation,
        }
    }
}

/// Installs the global subscriber. A subscriber that is already installed is
/// left in place.
pub fn init_tracing(settings: &LogSettings) -> Option<FileLogGuard> {
    let env_filter =
        EnvFilter::try_new(&settings.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &settings.file_dir {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender =
                    RollingFileAppender::new(settings.rotation.to_appender(), dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true);
                (Some(layer), Some(FileLogGuard { _guard: guard }))
            }
            Err(err) => {
                eprintln!(
                    "failed to create log directory {}, logging to stdout only: {err}",
                    dir.display()
                );
                (None, None)
            }
        },
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        return None;
    }

    guard
}
