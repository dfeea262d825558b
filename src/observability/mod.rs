//! # Observability
//!
//! - [`TraceContext`]: W3C trace propagation across handler, service and
//!   data layers
//! - [`telemetry`]: OpenTelemetry tracer provider and OTLP export
//! - [`logging`]: global `tracing` subscriber installation

pub mod logging;
pub mod telemetry;
mod trace;

pub use logging::LogFormat;
pub use telemetry::TelemetryConfig;
pub use trace::{TraceContext, TRACEPARENT};
