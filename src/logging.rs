//! Log file setup: path resolution, size-based rotation and the
//! `tracing-subscriber` install.
//!
//! Logs never go to stdout, which carries command results.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dapmux_config::{DefaultPaths, LogConfig, LogLevel};
use tracing_subscriber::EnvFilter;

/// Rotate once the live file reaches this size (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated files kept besides the live one.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

const LOG_FILE_NAME: &str = "dapmux.log";

/// `log.file` when configured, `<data_dir>/logs/dapmux.log` otherwise.
pub fn log_file_path(config: &LogConfig, paths: &DefaultPaths) -> PathBuf {
    config
        .file
        .clone()
        .unwrap_or_else(|| paths.log_dir().join(LOG_FILE_NAME))
}

/// Create the parent directory of `log_path` if needed.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Shift `dapmux.log` to `dapmux.log.1`, `.1` to `.2` and so on once the
/// live file reaches `max_size` bytes. `.<max_files>` is dropped.
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    let Ok(metadata) = fs::metadata(log_path) else {
        return Ok(());
    };
    if metadata.len() < max_size {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for i in (1..max_files).rev() {
        let from = rotated_path(log_path, i);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, i + 1))?;
        }
    }
    if max_files > 0 {
        fs::rename(log_path, rotated_path(log_path, 1))
    } else {
        fs::remove_file(log_path)
    }
}

/// Filter directive for a configured level.
pub fn level_filter(level: &LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// Install the global subscriber writing to the log file.
///
/// `RUST_LOG`, when set and valid, wins over `log.level`.
pub fn init(config: &LogConfig, paths: &DefaultPaths) -> Result<PathBuf> {
    let path = log_file_path(config, paths);
    ensure_log_dir(&path)
        .with_context(|| format!("failed to create log directory for {}", path.display()))?;
    rotate_log_files(&path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES)
        .with_context(|| format!("failed to rotate {}", path.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_filter(&config.level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("failed to install the log subscriber")?;
    Ok(path)
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{name}.{index}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_path_lives_under_the_data_dir() {
        let paths = DefaultPaths::with_home("/home/dev");
        let path = log_file_path(&LogConfig::default(), &paths);
        assert_eq!(
            path,
            PathBuf::from("/home/dev/.local/share/dapmux/logs/dapmux.log")
        );
    }

    #[test]
    fn configured_file_wins() {
        let config = LogConfig {
            file: Some(PathBuf::from("/var/log/dbg.log")),
            ..Default::default()
        };
        let path = log_file_path(&config, &DefaultPaths::with_home("/home/dev"));
        assert_eq!(path, PathBuf::from("/var/log/dbg.log"));
    }

    #[test]
    fn rotated_path_appends_index() {
        let base = Path::new("/tmp/dapmux.log");
        assert_eq!(rotated_path(base, 1), PathBuf::from("/tmp/dapmux.log.1"));
        assert_eq!(rotated_path(base, 4), PathBuf::from("/tmp/dapmux.log.4"));
    }

    #[test]
    fn ensure_log_dir_creates_missing_parents() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("a/b/dapmux.log");
        ensure_log_dir(&log).unwrap();
        assert!(tmp.path().join("a/b").is_dir());
    }

    #[test]
    fn small_files_are_left_alone() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("dapmux.log");
        fs::write(&log, "short").unwrap();
        rotate_log_files(&log, 1024, 3).unwrap();
        assert!(log.exists());
        assert!(!tmp.path().join("dapmux.log.1").exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        rotate_log_files(&tmp.path().join("dapmux.log"), 1, 3).unwrap();
    }

    #[test]
    fn rotation_shifts_and_drops_the_oldest() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("dapmux.log");
        fs::write(&log, "current").unwrap();
        fs::write(tmp.path().join("dapmux.log.1"), "one").unwrap();
        fs::write(tmp.path().join("dapmux.log.2"), "two").unwrap();

        rotate_log_files(&log, 1, 2).unwrap();

        assert!(!log.exists());
        let read = |name: &str| fs::read_to_string(tmp.path().join(name)).unwrap();
        assert_eq!(read("dapmux.log.1"), "current");
        assert_eq!(read("dapmux.log.2"), "one");
        assert!(!tmp.path().join("dapmux.log.3").exists());
    }

    #[test]
    fn level_filter_names_every_level() {
        assert_eq!(level_filter(&LogLevel::Trace), "trace");
        assert_eq!(level_filter(&LogLevel::Warn), "warn");
        assert_eq!(level_filter(&LogLevel::default()), "info");
    }
}
