use std::io;
use tracing::dispatcher::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, registry};

use crate::simulation::config::{Config, Logging};

pub const LOG_FILE_NAME: &str = "log_interventions.txt";

// Keeps the logging alive. Dropping it flushes the file writer and resets the subscriber.
#[allow(dead_code)]
pub struct LogGuards {
    log_guard: Option<WorkerGuard>,
    default: DefaultGuard,
}

pub fn init_std_out_logging_thread_local() -> DefaultGuard {
    let collector = registry().with(
        fmt::Layer::new()
            .with_writer(io::stdout)
            .with_filter(LevelFilter::INFO),
    );
    tracing::subscriber::set_default(collector)
}

/// Console logging at INFO and, unless logging is switched off in the output config, a json log
/// file in the output directory.
pub fn init_logging(config: &Config) -> LogGuards {
    let dir = config.output_dir();

    let (log_layer, log_guard) = if Logging::Info == config.output().logging {
        let log_file_appender = rolling::never(&dir, LOG_FILE_NAME);
        let (log_file, log_guard) = non_blocking(log_file_appender);
        let layer = fmt::Layer::new()
            .with_writer(log_file)
            .json()
            .with_ansi(false)
            .with_filter(LevelFilter::INFO);
        (Some(layer), Some(log_guard))
    } else {
        (None, None)
    };

    let console_layer = fmt::layer()
        .with_writer(io::stdout)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(LevelFilter::INFO);

    let collector = registry().with(log_layer).with(console_layer);
    let default = tracing::subscriber::set_default(collector);

    LogGuards { log_guard, default }
}
