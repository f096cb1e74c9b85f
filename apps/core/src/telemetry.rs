//! Tracing subscriber setup.

use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LogFormat;
use crate::error::AppError;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,hygieia_core=debug";

/// Installs the global subscriber. Logs go to stderr so stdout stays free
/// for replies.
///
/// Fails if a global subscriber is already set.
pub fn init(name: &str, format: LogFormat) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match format {
        LogFormat::Compact => Registry::default()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(name.to_string(), std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| AppError::Config(format!("Failed to install tracing subscriber: {}", e)))
}
