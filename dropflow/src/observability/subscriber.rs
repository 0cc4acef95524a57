//! Global subscriber installation.

use crate::config::LoggingSettings;
use crate::errors::TelemetryError;
use tracing_subscriber::EnvFilter;

/// Builds the log filter: `RUST_LOG` when set, the configured level otherwise.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.level).map_err(|e| TelemetryError::Filter {
        directive: settings.level.clone(),
        message: e.to_string(),
    })
}

/// Installs the global tracing subscriber, human-readable or JSON lines.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), TelemetryError> {
    let filter = build_filter(settings)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if settings.json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| TelemetryError::Init(e.to_string()))
}
