//! Logging setup for the probe binary
//!
//! Log lines go through a `tracing-appender` non-blocking writer so that slow
//! terminals never stall the probe. The returned [`WorkerGuard`] must be kept
//! alive until the process is about to exit; dropping it flushes every
//! pending line.

use std::io;

use tracing::Level;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{fmt, EnvFilter};

// Lines buffered before the writer blocks instead of dropping
const LOG_QUEUE_LINES: usize = 1024;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use when `RUST_LOG` is not set
    pub level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: Level::INFO }
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        LoggingConfig { level }
    }

    /// Info by default, debug when `debug` is set
    pub fn for_debug_flag(debug: bool) -> Self {
        LoggingConfig::new(if debug { Level::DEBUG } else { Level::INFO })
    }

    /// Filter used when `RUST_LOG` is unset
    pub fn default_filter(&self) -> EnvFilter {
        EnvFilter::default().add_directive(self.level.into())
    }
}

/// Install the global subscriber writing to stdout.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn setup_logging(config: &LoggingConfig) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    let (writer, guard) = NonBlockingBuilder::default()
        .lossy(false)
        .buffered_lines_limit(LOG_QUEUE_LINES)
        .finish(io::stdout());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.default_filter());

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()?;

    Ok(guard)
}
