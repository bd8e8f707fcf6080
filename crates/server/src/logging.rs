use std::io;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Initializes the global tracing subscriber: env-filtered, non-blocking
/// stdout writer. The returned guard must be held for the life of the
/// process; dropping it flushes and stops the writer's background thread.
pub fn init() -> tracing_appender::non_blocking::WorkerGuard {
    let default_level = if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_env_var("RELAY_LOG")
        .with_default_directive(default_level.into())
        .from_env_lossy()
        .add_directive("hyper_util=off".parse().unwrap())
        .add_directive("hyper=off".parse().unwrap())
        .add_directive("tokio_tungstenite=off".parse().unwrap());

    let (stdout, guard) = tracing_appender::non_blocking(io::stdout());
    let output = tracing_subscriber::fmt::layer().with_writer(stdout);
    let output = if cfg!(debug_assertions) {
        output.with_file(true).with_line_number(true)
    } else {
        output
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(output)
        .try_init()
        .expect("init tracing subscriber");

    guard
}
