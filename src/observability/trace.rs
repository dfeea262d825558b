//! # Trace Context
//!
//! Request-scoped trace identity. A [`TraceContext`] wraps the `tracing`
//! span of one unit of work; the OpenTelemetry layer gives that span its W3C
//! trace id and span id.
//!
//! The dispatcher creates one per request, continuing the caller's
//! `traceparent` when it sent a valid one. Every layer below derives a
//! [`TraceContext::child`] and runs inside its span. Contexts are cheap to
//! clone and may cross into blocking tasks.

use axum::http::HeaderMap;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::TraceContextExt;
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing::field::Empty;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header used for inbound extraction and outbound injection
pub const TRACEPARENT: &str = "traceparent";

/// Span of the current unit of work
#[derive(Debug, Clone)]
pub struct TraceContext {
    span: Span,
}

impl TraceContext {
    /// Start a new trace with no remote parent
    pub fn root() -> Self {
        Self::recorded(tracing::info_span!(
            parent: None,
            "operation",
            operation = "root",
            trace_id = Empty,
        ))
    }

    /// Server span for an inbound request.
    ///
    /// A missing or malformed `traceparent` starts a new trace.
    pub fn for_server(headers: &HeaderMap, operation: &'static str) -> Self {
        let span = tracing::info_span!(
            parent: None,
            "operation",
            operation,
            otel.kind = "server",
            trace_id = Empty,
        );

        let remote = TraceContextPropagator::new().extract(&HeaderExtractor(headers));
        if remote.span().span_context().is_valid() {
            span.set_parent(remote);
        }

        Self::recorded(span)
    }

    /// Child context for a nested operation in the same trace
    pub fn child(&self, operation: &'static str) -> Self {
        Self {
            span: tracing::info_span!(parent: &self.span, "operation", operation),
        }
    }

    /// Child context for a single SQL statement
    pub fn db_child(&self, database: &str, table: &str, statement: &str) -> Self {
        Self {
            span: tracing::info_span!(
                parent: &self.span,
                "sql",
                otel.kind = "client",
                db.system = "sqlite",
                db.name = database,
                db.sql.table = table,
                db.statement = statement,
            ),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Write this context's `traceparent` into outbound headers
    pub fn inject(&self, headers: &mut HeaderMap) {
        TraceContextPropagator::new()
            .inject_context(&self.span.context(), &mut HeaderInjector(headers));
    }

    /// `traceparent` value, or `None` when no telemetry layer is recording
    pub fn traceparent(&self) -> Option<String> {
        let mut headers = HeaderMap::new();
        self.inject(&mut headers);
        headers
            .get(TRACEPARENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    pub fn trace_id(&self) -> Option<String> {
        let cx = self.span.context();
        let span_context = cx.span().span_context().clone();
        span_context
            .is_valid()
            .then(|| span_context.trace_id().to_string())
    }

    /// Copy the trace id onto the span so log lines can be correlated
    fn recorded(span: Span) -> Self {
        let ctx = Self { span };
        if let Some(trace_id) = ctx.trace_id() {
            ctx.span.record("trace_id", trace_id.as_str());
        }
        ctx
    }
}
