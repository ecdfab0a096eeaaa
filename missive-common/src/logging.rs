use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

#[derive(Default)]
pub struct Logger;

impl Logger {
    /// Initialise the global tracing subscriber
    ///
    /// The level is taken from the `LOG_LEVEL` environment variable
    /// (`warn`/`info`/`trace`), falling back to `TRACE` in debug builds and
    /// `INFO` otherwise.
    pub fn init() {
        let level = if let Ok(level) = std::env::var("LOG_LEVEL") {
            match level.to_ascii_lowercase().as_str() {
                "warn" => LevelFilter::WARN,
                "info" => LevelFilter::INFO,
                "trace" => LevelFilter::TRACE,
                _ => LevelFilter::ERROR,
            }
        } else if cfg!(debug_assertions) {
            LevelFilter::TRACE
        } else {
            LevelFilter::INFO
        };

        tracing_subscriber::Registry::default()
            .with(
                (if cfg!(debug_assertions) {
                    tracing_subscriber::fmt::layer()
                } else {
                    tracing_subscriber::fmt::layer()
                        .with_file(false)
                        .with_line_number(false)
                })
                .compact()
                .with_ansi(true)
                .with_filter(level),
            )
            .init();
    }
}
