//! tracing subscriber setup.
//!
//! Non-interactive modes log to stderr. The TUI owns the terminal, so there
//! logs go to a file through a non-blocking writer.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_NAME: &str = "majin-analyzer.log";

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Default log file for interactive sessions: the user cache dir, falling
/// back to the working directory.
pub fn default_log_file() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("majin-analyzer"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(LOG_FILE_NAME)
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("majin_analyzer={level},warn"))
    })
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init(level: &str, target: &LogTarget) -> Result<Option<WorkerGuard>> {
    let (layer, guard) = match target {
        LogTarget::Stderr => (
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .boxed(),
            None,
        ),
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .boxed(),
                Some(guard),
            )
        }
    };

    tracing_subscriber::registry()
        .with(filter(level))
        .with(layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;
    Ok(guard)
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_file_has_fixed_name() {
        assert!(default_log_file().ends_with(LOG_FILE_NAME));
    }

    #[test]
    fn log_file_parent_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/app.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
