//! # Request Dispatcher
//!
//! `/testing` is a single endpoint whose operation is chosen by HTTP method
//! and by the shape of the query string:
//!
//! | method | query shape                       | operation      |
//! |--------|-----------------------------------|----------------|
//! | GET    | 2 keys, `nama` present            | LookupByName   |
//! | GET    | 2 keys, `kota` present            | LookupByCity   |
//! | GET    | 2 keys, neither                   | 400            |
//! | GET    | 1 key, `user`                     | LookupByMany   |
//! | GET    | anything else                     | nothing        |
//! | POST   | `post` present                    | InsertMany     |
//! | PUT    | any                               | Update         |
//! | DELETE | any                               | nothing        |
//! | other  |                                   | 400            |
//!
//! Key counts are over distinct keys. "Nothing" still answers with an empty
//! success envelope, as does a lookup that matched no rows (`"data": null`).
//!
//! Each request runs once, start to finish, under its own server span, and
//! answers with exactly one [`Envelope`].

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use crate::config::AuthConfig;
use crate::entity::{BatchInput, Record};
use crate::errors::{AppError, AppResult};
use crate::observability::{TraceContext, TRACEPARENT};
use crate::service::RecordService;

use super::envelope::Envelope;

/// Path the dispatcher is mounted on
pub const TESTING_PATH: &str = "/testing";

/// Marker an `Authorization` header must contain
const TOKEN_MARKER: &str = "Token ";

/// Whether tokens are checked before dispatch, and against which feature
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub required: bool,
    pub feature_code: String,
}

impl From<&AuthConfig> for AuthPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            required: config.required,
            feature_code: config.feature_code.clone(),
        }
    }
}

/// Operation selected for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    LookupByName(String),
    LookupByCity(String),
    LookupByMany,
    InsertMany,
    Update,
    /// Accepted without running anything
    Noop,
}

/// Decoded query string, keeping every pair in order
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn from_uri(uri: &Uri) -> AppResult<Self> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map_err(|err| AppError::bad_request(format!("400 invalid query string: {}", err)))?;
        Ok(Self { pairs })
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.pairs
            .iter()
            .map(|(key, _)| key.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// First value given for `key`
    pub fn first(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Pick the operation for `method` and `params`
pub fn route(method: &Method, params: &QueryParams) -> AppResult<Route> {
    match *method {
        Method::GET => match params.key_count() {
            2 => {
                if let Some(name) = params.first("nama") {
                    Ok(Route::LookupByName(name.to_string()))
                } else if let Some(city) = params.first("kota") {
                    Ok(Route::LookupByCity(city.to_string()))
                } else {
                    Err(AppError::bad_request("400 expected nama or kota"))
                }
            }
            1 if params.contains("user") => Ok(Route::LookupByMany),
            _ => Ok(Route::Noop),
        },
        Method::POST if params.contains("post") => Ok(Route::InsertMany),
        Method::POST => Ok(Route::Noop),
        Method::PUT => Ok(Route::Update),
        Method::DELETE => Ok(Route::Noop),
        _ => Err(AppError::bad_request(format!(
            "400 method {} not supported",
            method
        ))),
    }
}

/// Read the `Authorization` header.
///
/// Absent or empty is fine. Present without the `Token ` marker is
/// forbidden.
pub fn extract_token(headers: &HeaderMap) -> AppResult<Option<String>> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AppError::forbidden("403 unreadable Authorization header"))?;
    if value.is_empty() {
        return Ok(None);
    }
    if !value.contains(TOKEN_MARKER) {
        return Err(AppError::forbidden(
            "403 Authorization header is not a Token credential",
        ));
    }

    Ok(Some(value.to_string()))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("400 malformed request body: {}", err)))
}

fn to_data<T: Serialize>(value: T) -> AppResult<Option<Value>> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|err| AppError::internal(format!("failed to encode response: {}", err)))
}

/// Lookup results for the envelope; no rows is no data
fn records_data(records: Vec<Record>) -> AppResult<Option<Value>> {
    if records.is_empty() {
        return Ok(None);
    }
    to_data(records)
}

/// Request handler for the single `/testing` endpoint
pub struct Dispatcher {
    service: RecordService,
    auth: AuthPolicy,
}

impl Dispatcher {
    pub fn new(service: RecordService, auth: AuthPolicy) -> Self {
        Self { service, auth }
    }

    /// Run one request to completion and build its response
    pub async fn dispatch(
        &self,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let ctx = TraceContext::for_server(&headers, "TestingHandler");

        async {
            tracing::info!(method = %method, url = %uri, "HTTP request received");

            let envelope = match self.handle(&ctx, &method, &uri, &headers, &body).await {
                Ok(data) => {
                    tracing::info!(method = %method, url = %uri, "HTTP request done");
                    Envelope::success(data)
                }
                Err(err) => {
                    let err = err.wrap("[HANDLER]");
                    tracing::error!(
                        method = %method,
                        url = %uri,
                        kind = ?err.kind(),
                        error = %err,
                        "HTTP request error"
                    );
                    Envelope::failure(err.kind())
                }
            };

            let mut response = envelope.into_response();
            if let Some(value) = ctx
                .traceparent()
                .and_then(|traceparent| HeaderValue::from_str(&traceparent).ok())
            {
                response.headers_mut().insert(TRACEPARENT, value);
            }
            response
        }
        .instrument(ctx.span().clone())
        .await
    }

    async fn handle(
        &self,
        ctx: &TraceContext,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> AppResult<Option<Value>> {
        let token = extract_token(headers)?;

        if self.auth.required {
            let token = token
                .ok_or_else(|| AppError::unauthorized("401 missing Authorization token"))?;
            self.service
                .authorize(ctx, &token, &self.auth.feature_code)
                .await?;
        }

        let params = QueryParams::from_uri(uri)?;

        match route(method, &params)? {
            Route::LookupByName(name) => {
                records_data(self.service.lookup_by_name(ctx, &name).await?)
            }
            Route::LookupByCity(city) => {
                records_data(self.service.lookup_by_city(ctx, &city).await?)
            }
            Route::LookupByMany => {
                let batch: BatchInput = parse_body(body)?;
                records_data(self.service.lookup_by_many(ctx, &batch.ids).await?)
            }
            Route::InsertMany => {
                let batch: BatchInput = parse_body(body)?;
                let ids = self.service.insert_many(ctx, &batch.records).await?;
                tracing::info!(inserted = ids.len(), "batch insert done");
                Ok(None)
            }
            Route::Update => {
                let record: Record = parse_body(body)?;
                self.service.update(ctx, &record).await?;
                Ok(None)
            }
            Route::Noop => {
                tracing::debug!(method = %method, keys = params.key_count(), "no operation for request shape");
                Ok(None)
            }
        }
    }
}

async fn testing_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatcher.dispatch(method, uri, headers, body).await
}

/// Router exposing the dispatcher on [`TESTING_PATH`] for every method
pub fn testing_routes(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route(TESTING_PATH, any(testing_handler))
        .with_state(dispatcher)
}
