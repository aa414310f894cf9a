use tracing_subscriber::EnvFilter;
use tripdesk_core::config::{LogFormat, LoggingConfig};

/// Installs the global subscriber. Output goes to stderr; stdout carries the chat transcript.
///
/// `RUST_LOG` wins over `logging.level` when set. Calling this twice keeps the first subscriber.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!(event_name = "cli.logging.already_installed");
    }
}
