//! Process-wide `tracing` subscriber setup
//!
//! Log lines go to stdout, one event per line, filtered by `RUST_LOG`
//! (falling back to `info`). The filter applies to log output only; the
//! OpenTelemetry layer sees every span.

use opentelemetry_sdk::trace::{Tracer, TracerProvider as SdkTracerProvider};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer, Registry};

use super::telemetry::{self, TelemetryConfig, TelemetryError};

/// Output encoding for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON, one object per line
    #[default]
    Json,
    /// Human-readable, for local development
    Pretty,
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("failed to install subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

type WithTelemetry = Layered<OpenTelemetryLayer<Registry, Tracer>, Registry>;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<WithTelemetry> + Send + Sync> {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_filter(env_filter())
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_filter(env_filter())
            .boxed(),
    }
}

/// Install the global subscriber and telemetry pipeline.
///
/// Returns the tracer provider; pass it to [`telemetry::shutdown`] on exit.
/// Fails if a subscriber is already installed.
pub fn init(
    format: LogFormat,
    config: &TelemetryConfig,
) -> Result<SdkTracerProvider, LoggingError> {
    let provider = telemetry::tracer_provider(config)?;

    let subscriber = Registry::default()
        .with(telemetry::layer(&provider))
        .with(fmt_layer(format));
    tracing::subscriber::set_global_default(subscriber)?;

    telemetry::install_global(&provider);
    Ok(provider)
}
