//! OpenTelemetry singleton.
//!
//! Thin wrapper over the runtime's tracing hooks that folds their failures
//! into the engine's [`Error::Configuration`] kind. Initialization is
//! process-global and one-shot; a repeat is ignored with a warning.

pub use kestrel_runtime::{
    OpenTelemetryConfig, OpenTelemetryMetricsConfig, OpenTelemetryTracesConfig,
};

use crate::errors::Error;
use crate::logger::{Level, Logger};

pub struct OpenTelemetry;

impl OpenTelemetry {
    /// Validate and install the process-wide OpenTelemetry configuration.
    ///
    /// Invalid configuration fails synchronously with a configuration error.
    /// A second initialization logs a warning and keeps the first one.
    pub fn init(config: OpenTelemetryConfig) -> Result<(), Error> {
        kestrel_runtime::init_opentelemetry(config).map_err(Error::Configuration)?;
        Logger::log(
            Level::Info,
            "OpenTelemetry",
            "OpenTelemetry initialized successfully",
        );
        Ok(())
    }

    pub fn is_initialized() -> bool {
        kestrel_runtime::otel_initialized()
    }

    /// Whether the current request should get a tracing span.
    pub fn should_sample() -> bool {
        kestrel_runtime::should_sample()
    }

    /// The trace sample percentage, if traces are configured.
    pub fn get_sample_percentage() -> Option<u32> {
        kestrel_runtime::get_sample_percentage()
    }

    /// Change the trace sample percentage at runtime, 0-100.
    pub fn set_sample_percentage(percentage: u32) -> Result<(), Error> {
        kestrel_runtime::set_sample_percentage(percentage).map_err(Error::Configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_a_configuration_error() {
        let err = OpenTelemetry::init(OpenTelemetryConfig {
            flush_interval_ms: Some(0),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn sample_percentage_without_init_errors() {
        if !OpenTelemetry::is_initialized() {
            assert!(!OpenTelemetry::should_sample());
            assert!(OpenTelemetry::set_sample_percentage(5).is_err());
        }
    }
}
