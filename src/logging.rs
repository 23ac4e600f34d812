//! Logger setup.
//!
//! The engine only talks to the `log` facade. Binaries call [`init_logging`]
//! once, early in `main`; libraries embedding the engine may install their
//! own logger instead.

use std::sync::Once;

/// `env_filter` uses the `env_logger` filter syntax, e.g.
/// `"info"` or `"telcom_ngin=debug"`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global logger. Later calls are ignored.
///
/// The filter comes from `config.env_filter`, then `RUST_LOG`, and falls
/// back to `info`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }
        builder.write_style(config.write_style);

        if let Err(e) = builder.try_init() {
            println!("Warning: Could not initialize logger: {}", e);
            return;
        }
        log::debug!("logging initialized");
    });
}
