//! Tracing setup for the binaries

use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_FILE_PREFIX: &str = "uploader";

/// Install the global subscriber.
///
/// Console output on stderr honours `RUST_LOG` and defaults to `warn`.
/// When `log_dir` is usable, `info` and above are also written as JSON to a
/// daily rolling file there. Keep the returned guard alive until exit or
/// buffered lines are lost.
pub fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));

    let (file_layer, guard) = match log_dir.and_then(file_writer) {
        Some((writer, guard)) => {
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::new("info"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // A subscriber may already be set, e.g. under tests
    let _ = tracing_subscriber::registry().with(console).with(file_layer).try_init();

    guard
}

fn file_writer(dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(dir);

    match appender {
        Ok(appender) => Some(tracing_appender::non_blocking(appender)),
        Err(e) => {
            eprintln!("⚠️  File logging disabled, cannot use {}: {}", dir.display(), e);
            None
        }
    }
}
