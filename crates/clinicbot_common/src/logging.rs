//! Logging setup for the clinic bot.
//!
//! All crates log through `tracing`; the binaries call one of the init
//! functions below once at startup.

use clinicbot_config::LoggingConfig;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_PREFIX: &str = "clinicbot.log";

/// Initialize the tracing subscriber with a specific log level.
///
/// `RUST_LOG` is honoured; the level applies to every `clinicbot*` target.
pub fn init_with_level(level: Level) {
    let result = tracing_subscriber::registry()
        .with(console_layer())
        .with(filter_for(level))
        .try_init();

    // try_init fails when a subscriber is already installed, e.g. in tests
    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}

/// Initialize logging from the `[logging]` section.
///
/// When `dir` is set a daily rolling file is written next to the console
/// output. The returned guard must be kept alive for the file writer to flush.
pub fn init_from_config(config: &LoggingConfig) -> Option<WorkerGuard> {
    let level = parse_level(&config.level);

    let (file_layer, guard) = match config.dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(console_layer())
        .with(file_layer)
        .with(filter_for(level))
        .try_init();

    if result.is_ok() {
        info!(level = %level, file = config.dir.is_some(), "Logging initialized");
        if level == Level::INFO && !config.level.eq_ignore_ascii_case("info") {
            warn!(configured = %config.level, "unknown log level, using info");
        }
    }
    guard
}

/// Parses "debug", "WARN", ... falling back to INFO.
pub fn parse_level(raw: &str) -> Level {
    raw.trim().parse::<Level>().unwrap_or(Level::INFO)
}

fn console_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
}

fn filter_for(level: Level) -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match format!("clinicbot={}", level).parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}
