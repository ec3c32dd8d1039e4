use std::sync::Once;

/// Filter used when neither the command line nor `RUST_LOG` sets one.
///
/// wgpu and naga are chatty at `info`; the server's own crates are not.
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` directives, e.g. `"vellum_wire=trace"`. Wins over `RUST_LOG`.
    pub filter: Option<String>,
    /// Prefix records with a microsecond timestamp.
    ///
    /// Useful when matching server logs against client-side frame timing.
    pub timestamps: bool,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            timestamps: true,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: Option<String>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` as the `log` backend.
///
/// Only the first call in a process does anything. A logger installed
/// elsewhere first (a test harness, say) is left in place.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or(DEFAULT_FILTER);
        let mut builder = env_logger::Builder::from_env(env);
        if let Some(filter) = &config.filter {
            builder.parse_filters(filter);
        }
        if config.timestamps {
            builder.format_timestamp_micros();
        } else {
            builder.format_timestamp(None);
        }
        builder.write_style(config.write_style);

        match builder.try_init() {
            Ok(()) => log::debug!("logger ready ({})", effective_filter(&config)),
            Err(_) => log::debug!("a logger was already installed; keeping it"),
        }
    });
}

/// The filter string `init_logging` ends up applying, for the startup log line.
fn effective_filter(config: &LoggingConfig) -> String {
    config
        .filter
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
}
