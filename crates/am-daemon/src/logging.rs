use tracing_subscriber::{fmt, EnvFilter};

/// Output format for daemon logs.
///
/// Human-readable by default; JSON when the logs are headed for a shipper.
/// `AUTOMEND_LOG_FORMAT=json` selects JSON without a config change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    /// Resolve the format from `AUTOMEND_LOG_FORMAT`, defaulting to human.
    pub fn from_env() -> Self {
        match std::env::var("AUTOMEND_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Human,
        }
    }
}

/// Initialize the tracing subscriber for the daemon.
///
/// The filter comes from `RUST_LOG` when set, otherwise `default_level`
/// (e.g. "info", "am_cycles=debug,warn"). Safe to call multiple times;
/// subsequent calls are no-ops, so tests can initialise freely.
pub fn init(service_name: &str, default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match format {
        LogFormat::Human => builder.try_init().ok(),
        LogFormat::Json => builder.json().try_init().ok(),
    };

    tracing::info!(service = service_name, format = ?format, "logging initialised");
}
