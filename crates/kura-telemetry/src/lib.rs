//! OpenTelemetry integration for kura.
//!
//! Provides OTel tracing layer setup, W3C Trace Context extraction for
//! requests arriving over HTTP, and a sampler tuned for request spans.
//!
//! # Activation
//!
//! Build with the `telemetry` feature. OTel export then activates when standard
//! OTel environment variables are set:
//!
//! ```bash
//! # Minimal: enables OTLP export to localhost:4317
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 cargo run -p kura-server
//!
//! # Full control
//! OTEL_SERVICE_NAME=kura-server \
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://jaeger:4317 \
//! OTEL_TRACES_EXPORTER=otlp \
//! cargo run -p kura-server
//! ```
//!
//! Set `OTEL_SDK_DISABLED=true` to explicitly disable even when the endpoint is set.
//! Without the feature, [`request_span`] still returns a plain tracing span.

#[cfg(feature = "telemetry")]
mod otel;

#[cfg(feature = "telemetry")]
pub use otel::{otel_layer, OtelGuard};

/// Check whether OTel export should be enabled.
///
/// Returns `true` when the `telemetry` feature is compiled in and standard
/// OTel env vars indicate export is desired:
/// - `OTEL_SDK_DISABLED` is NOT set to `"true"`
/// - AND at least one of:
///   - `OTEL_EXPORTER_OTLP_ENDPOINT` is set
///   - `OTEL_TRACES_EXPORTER` is set (and not `"none"`)
pub fn otel_enabled() -> bool {
    if !cfg!(feature = "telemetry") {
        return false;
    }
    otel_env_requested(|key| std::env::var(key).ok())
}

fn otel_env_requested(var: impl Fn(&str) -> Option<String>) -> bool {
    // Explicit disable takes priority
    if var("OTEL_SDK_DISABLED")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        return false;
    }

    if var("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
        return true;
    }

    if let Some(exporter) = var("OTEL_TRACES_EXPORTER") {
        return !exporter.eq_ignore_ascii_case("none");
    }

    false
}

/// Create the span an HTTP request is served in.
///
/// When `traceparent` is non-empty and OTel is compiled in, the span is
/// parented to the caller's remote trace context.
pub fn request_span(method: &str, path: &str, traceparent: &str, tracestate: &str) -> tracing::Span {
    let span = tracing::info_span!("http.request", method, path);

    #[cfg(feature = "telemetry")]
    otel::link_remote_parent(&span, traceparent, tracestate);

    #[cfg(not(feature = "telemetry"))]
    let _ = (traceparent, tracestate);

    span
}
