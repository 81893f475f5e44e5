//! Tracing setup: an `EnvFilter` seeded from config (overridable via
//! `RUST_LOG`), writing to a non-blocking stdout sink.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Holds the non-blocking writer's worker thread alive; drop it only at
/// process exit or buffered log lines are lost.
pub struct LoggingGuard(#[allow(dead_code)] tracing_appender::non_blocking::WorkerGuard);

pub fn init(config: &LoggingConfig) -> LoggingGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let subscriber = fmt().with_env_filter(filter).with_writer(writer);
    if config.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    LoggingGuard(guard)
}
