use clap::ValueEnum;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise everything at `info` and above is
/// logged. Calling this twice is harmless.
pub fn init(format: LogFormat) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Text => fmt().with_env_filter(filter).with_target(false).try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Log subscriber already installed");
    }
}
