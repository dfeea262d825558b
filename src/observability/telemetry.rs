//! # Telemetry
//!
//! OpenTelemetry tracer provider and the `tracing` layer that feeds it.
//!
//! The layer is always installed, so every `tracing` span carries a real
//! W3C trace identity that can be propagated to callers and to the auth
//! backend. Spans leave the process only when an OTLP endpoint is set.

use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{
    RandomIdGenerator, Sampler, Tracer, TracerProvider as SdkTracerProvider,
};
use opentelemetry_sdk::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

const TRACER_NAME: &str = "timdaen";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP span exporter: {0}")]
    Exporter(String),
}

/// Span export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP/gRPC collector, e.g. `http://otel-collector:4317`; empty disables export
    #[serde(default)]
    pub endpoint: String,

    /// Reported as `service.name`
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Fraction of new traces sampled; callers' sampling decisions are kept
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    #[serde(default = "default_export_timeout_ms")]
    pub export_timeout_ms: u64,
}

fn default_service_name() -> String {
    "testing".to_string()
}

fn default_sample_rate() -> f64 {
    1.0
}

fn default_export_timeout_ms() -> u64 {
    10_000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            service_name: default_service_name(),
            sample_rate: default_sample_rate(),
            export_timeout_ms: default_export_timeout_ms(),
        }
    }
}

fn create_resource(service_name: &str) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ])
}

/// Build the tracer provider.
///
/// With an endpoint configured this spawns the batch exporter, so it must
/// run inside a tokio runtime.
pub fn tracer_provider(config: &TelemetryConfig) -> Result<SdkTracerProvider, TelemetryError> {
    let mut builder = SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            config.sample_rate,
        ))))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(create_resource(&config.service_name));

    if !config.endpoint.is_empty() {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(config.endpoint.clone())
            .with_timeout(Duration::from_millis(config.export_timeout_ms))
            .build()
            .map_err(|err| TelemetryError::Exporter(err.to_string()))?;

        builder = builder.with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio);
    }

    Ok(builder.build())
}

/// `tracing` layer recording spans into `provider`
pub fn layer<S>(provider: &SdkTracerProvider) -> OpenTelemetryLayer<S, Tracer>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    OpenTelemetryLayer::new(provider.tracer(TRACER_NAME))
}

/// Make `provider` and the W3C propagator the process-wide defaults
pub fn install_global(provider: &SdkTracerProvider) {
    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(provider.clone());
}

/// Flush pending spans and stop the exporter
pub fn shutdown(provider: &SdkTracerProvider) {
    if let Err(err) = provider.shutdown() {
        tracing::warn!(error = %err, "failed to flush spans on shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[test]
    fn test_config_defaults() {
        let config: TelemetryConfig = serde_json::from_str("{}").unwrap();
        assert!(config.endpoint.is_empty());
        assert_eq!(config.service_name, "testing");
        assert_eq!(config.sample_rate, 1.0);
    }

    #[test]
    fn test_local_provider_assigns_trace_ids() {
        let provider = tracer_provider(&TelemetryConfig::default()).unwrap();
        let subscriber = Registry::default().with(layer(&provider));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("operation");
            let cx = span.context();
            let span_context = cx.span().span_context().clone();

            assert!(span_context.is_valid());
            assert!(span_context.is_sampled());
        });
    }
}
