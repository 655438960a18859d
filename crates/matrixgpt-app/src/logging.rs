use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_PREFIX: &str = "matrixgpt";
pub const LOG_FILE_SUFFIX: &str = "log";

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Hourly,
    Daily,
}

impl LogRotation {
    fn appender_rotation(self) -> Rotation {
        match self {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }

    /// Number of rolled files that together span `retention_days`.
    pub fn files_for_days(self, retention_days: u32) -> usize {
        let per_day = match self {
            LogRotation::Hourly => 24,
            LogRotation::Daily => 1,
        };
        retention_days.max(1) as usize * per_day
    }
}

/// Where and how the bot writes its log files.
#[derive(Debug, Clone)]
pub struct FileLogSettings {
    pub dir: PathBuf,
    pub rotation: LogRotation,
    pub retention_days: u32,
}

impl FileLogSettings {
    /// Logs live in `<data_dir>/logs`.
    pub fn new(data_dir: impl AsRef<Path>, rotation: LogRotation, retention_days: u32) -> Self {
        Self {
            dir: data_dir.as_ref().join("logs"),
            rotation,
            retention_days,
        }
    }

    fn appender(&self) -> Result<RollingFileAppender> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create log directory: {}", self.dir.display()))?;
        RollingFileAppender::builder()
            .rotation(self.rotation.appender_rotation())
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix(LOG_FILE_SUFFIX)
            .max_log_files(self.rotation.files_for_days(self.retention_days))
            .build(&self.dir)
            .with_context(|| format!("Failed to open log file in {}", self.dir.display()))
    }
}

/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. "info", "matrixgpt=debug").
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the file subscriber. Buffered lines are flushed when the returned
/// guard drops, so the caller keeps it alive until exit.
pub fn init_file_logging(settings: &FileLogSettings, default_level: &str) -> Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(settings.appender()?);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(guard)
}

pub fn init_console_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use uuid::Uuid;

    fn test_data_dir() -> PathBuf {
        std::env::temp_dir().join(format!("matrixgpt_logging_test_{}", Uuid::new_v4()))
    }

    #[test]
    fn test_files_for_days() {
        assert_eq!(LogRotation::Hourly.files_for_days(30), 720);
        assert_eq!(LogRotation::Daily.files_for_days(30), 30);
        assert_eq!(LogRotation::Daily.files_for_days(0), 1);
    }

    #[test]
    fn test_settings_place_logs_under_data_dir() {
        let settings = FileLogSettings::new("/var/lib/matrixgpt", LogRotation::Daily, 7);
        assert_eq!(settings.dir, PathBuf::from("/var/lib/matrixgpt/logs"));
    }

    #[test]
    fn test_rotation_parses_lowercase() {
        let daily: LogRotation = serde_json::from_str("\"daily\"").unwrap();
        assert_eq!(daily, LogRotation::Daily);
        assert!(serde_json::from_str::<LogRotation>("\"weekly\"").is_err());
    }

    #[test]
    fn test_appender_creates_prefixed_file() {
        let data_dir = test_data_dir();
        let settings = FileLogSettings::new(&data_dir, LogRotation::Hourly, 30);

        let mut appender = settings.appender().unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(&settings.dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("matrixgpt."));
        assert!(names[0].ends_with(".log"));
        let _ = std::fs::remove_dir_all(&data_dir);
    }
}
