//! OpenTelemetry hooks.
//!
//! Initialization is process-global and one-shot; repeated initialization is
//! a warning, not an error. Span handles are leaked allocations addressed by
//! `u64` so they can travel inside wire messages; handle `0` is the no-op
//! span used when sampling declines.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// Default percentage of requests sampled for tracing.
const DEFAULT_SAMPLE_PERCENTAGE: u32 = 1;

/// Default flush interval for exporters, in milliseconds.
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;

/// Trace exporting configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenTelemetryTracesConfig {
    /// Collector endpoint: `http://`, `https://`, `grpc://` or `file://`.
    pub endpoint: String,
    /// Percentage of requests to sample, 0-100. Defaults to 1.
    pub sample_percentage: Option<u32>,
}

/// Metrics exporting configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenTelemetryMetricsConfig {
    pub endpoint: String,
}

/// Top-level OpenTelemetry configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenTelemetryConfig {
    pub traces: Option<OpenTelemetryTracesConfig>,
    pub metrics: Option<OpenTelemetryMetricsConfig>,
    /// Exporter flush interval in milliseconds; must be positive.
    /// Defaults to 5000.
    pub flush_interval_ms: Option<u64>,
}

struct OtelState {
    sample_percentage: AtomicU32,
    traces_configured: bool,
}

static STATE: OnceLock<OtelState> = OnceLock::new();

fn validate_endpoint(endpoint: &str) -> Result<(), String> {
    let supported = ["http://", "https://", "grpc://", "file://"];
    if supported.iter().any(|scheme| endpoint.starts_with(scheme)) {
        Ok(())
    } else {
        Err(format!(
            "Unsupported collector endpoint protocol: {endpoint}"
        ))
    }
}

/// Initialize the process-wide OpenTelemetry state.
///
/// Validates the configuration synchronously, then stores it. A second call
/// logs a warning and leaves the existing configuration in place.
pub fn init_opentelemetry(config: OpenTelemetryConfig) -> Result<(), String> {
    if let Some(flush) = config.flush_interval_ms {
        if flush == 0 {
            return Err("flush_interval_ms must be a positive integer".to_string());
        }
    }
    if let Some(traces) = &config.traces {
        validate_endpoint(&traces.endpoint)?;
        if let Some(pct) = traces.sample_percentage {
            if pct > 100 {
                return Err("Sample percentage must be between 0 and 100".to_string());
            }
        }
    }
    if let Some(metrics) = &config.metrics {
        validate_endpoint(&metrics.endpoint)?;
    }

    let sample_percentage = config
        .traces
        .as_ref()
        .and_then(|t| t.sample_percentage)
        .unwrap_or(DEFAULT_SAMPLE_PERCENTAGE);
    let state = OtelState {
        sample_percentage: AtomicU32::new(sample_percentage),
        traces_configured: config.traces.is_some(),
    };

    if STATE.set(state).is_err() {
        tracing::warn!("OpenTelemetry already initialized - ignoring new configuration");
        return Ok(());
    }

    let flush = config
        .flush_interval_ms
        .unwrap_or(DEFAULT_FLUSH_INTERVAL_MS);
    tracing::info!(flush_interval_ms = flush, "OpenTelemetry initialized");
    Ok(())
}

/// Whether [`init_opentelemetry`] has run.
pub fn otel_initialized() -> bool {
    STATE.get().is_some()
}

/// The configured trace sample percentage, if traces are configured.
pub fn get_sample_percentage() -> Option<u32> {
    let state = STATE.get()?;
    state
        .traces_configured
        .then(|| state.sample_percentage.load(Ordering::Relaxed))
}

/// Change the trace sample percentage at runtime.
pub fn set_sample_percentage(percentage: u32) -> Result<(), String> {
    let Some(state) = STATE.get() else {
        return Err("OpenTelemetry config traces not initialized".to_string());
    };
    if !state.traces_configured {
        return Err("OpenTelemetry config traces not initialized".to_string());
    }
    if percentage > 100 {
        return Err("Sample percentage must be between 0 and 100".to_string());
    }
    state
        .sample_percentage
        .store(percentage, Ordering::Relaxed);
    Ok(())
}

/// Coin flip against the configured sample percentage. False when tracing is
/// not initialized or traces are not configured.
pub fn should_sample() -> bool {
    match get_sample_percentage() {
        Some(percentage) => rand::random::<f64>() * 100.0 < percentage as f64,
        None => false,
    }
}

struct Span {
    name: String,
    started_at: Instant,
}

/// Open a tracing span named after the request it brackets. Returns an
/// opaque handle suitable for a wire message; `0` when sampling is off.
pub fn create_otel_span(name: &str) -> u64 {
    if STATE.get().is_none() {
        return 0;
    }
    Box::into_raw(Box::new(Span {
        name: name.to_string(),
        started_at: Instant::now(),
    })) as u64
}

/// Close a span handle previously returned by [`create_otel_span`].
/// Handle `0` is a no-op.
pub fn drop_otel_span(handle: u64) {
    if handle == 0 {
        return;
    }
    // The handle round-trips through wire messages but never leaves the
    // process; it is only ever minted by create_otel_span.
    let span = unsafe { Box::from_raw(handle as *mut Span) };
    tracing::trace!(
        span = %span.name,
        elapsed_us = span.started_at.elapsed().as_micros() as u64,
        "request span closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_flush_interval() {
        let err = init_opentelemetry(OpenTelemetryConfig {
            flush_interval_ms: Some(0),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.contains("positive"));
    }

    #[test]
    fn rejects_overflowing_sample_percentage() {
        let err = init_opentelemetry(OpenTelemetryConfig {
            traces: Some(OpenTelemetryTracesConfig {
                endpoint: "http://localhost:4318/v1/traces".to_string(),
                sample_percentage: Some(101),
            }),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.contains("between 0 and 100"));
    }

    #[test]
    fn rejects_unknown_endpoint_scheme() {
        let err = init_opentelemetry(OpenTelemetryConfig {
            traces: Some(OpenTelemetryTracesConfig {
                endpoint: "ftp://collector".to_string(),
                sample_percentage: None,
            }),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.contains("endpoint"));
    }

    #[test]
    fn span_handle_zero_drop_is_noop() {
        drop_otel_span(0);
    }

    #[test]
    fn init_then_sample_and_adjust() {
        // Valid init; may race with other tests having initialized already,
        // in which case the first configuration wins.
        let _ = init_opentelemetry(OpenTelemetryConfig {
            traces: Some(OpenTelemetryTracesConfig {
                endpoint: "file:///tmp/otel".to_string(),
                sample_percentage: Some(100),
            }),
            ..Default::default()
        });
        if otel_initialized() && get_sample_percentage().is_some() {
            set_sample_percentage(100).unwrap();
            assert_eq!(get_sample_percentage(), Some(100));
            assert!(should_sample());

            set_sample_percentage(0).unwrap();
            assert!(!should_sample());

            assert!(set_sample_percentage(101).is_err());

            let span = create_otel_span("Get");
            assert_ne!(span, 0);
            drop_otel_span(span);
        }
    }
}
