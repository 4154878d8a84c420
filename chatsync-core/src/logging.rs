//! Tracing setup
//!
//! Both binaries log to a daily file under `$XDG_STATE_HOME/chatsync/`
//! (`chatsync.log.YYYY-MM-DD`). stdout belongs to the terminal UI and the
//! CLI's output, so nothing is logged there.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

const LOG_PREFIX: &str = "chatsync.log";

/// Dependencies that are noisy at `debug` and below.
const QUIET_TARGETS: &[&str] = &["rusqlite=warn", "tokio=warn"];

/// Flushes buffered log lines when dropped. Hold it for the life of `main`.
pub struct LoggingGuard {
    log_dir: PathBuf,
    _worker: WorkerGuard,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Install the global subscriber writing to the rolling log file.
///
/// `RUST_LOG` takes precedence over `[logging] level`.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let (writer, worker) = tracing_appender::non_blocking(appender(&log_dir, config.max_files)?);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => filter_for(&config.level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        log_dir,
        _worker: worker,
    })
}

fn appender(dir: &Path, max_files: usize) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .max_log_files(max_files.max(1))
        .build(dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {}", e)))
}

/// Filter for a configured level, with store and runtime internals kept quiet.
fn filter_for(level: &str) -> Result<EnvFilter> {
    let directives = std::iter::once(level.trim())
        .chain(QUIET_TARGETS.iter().copied())
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("invalid [logging] level '{}': {}", level, e)))
}

/// Send logs to the test harness's captured output. Safe to call repeatedly.
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chatsync_core=debug"));
    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}
