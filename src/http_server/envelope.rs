//! # Response Envelope
//!
//! Every `/testing` response is `{"data", "metadata", "error"}`, serialized
//! once. Success fills `data`; failure fills `error`. `metadata` is always
//! null.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ErrorKind;

/// Error block of the envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub msg: String,
    pub status: bool,
}

/// Uniform response body
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub data: Option<Value>,
    pub metadata: Option<Value>,
    pub error: Option<ErrorBody>,

    #[serde(skip)]
    status: StatusCode,
}

impl Envelope {
    pub fn success(data: Option<Value>) -> Self {
        Self {
            data,
            metadata: None,
            error: None,
            status: StatusCode::OK,
        }
    }

    pub fn failure(kind: ErrorKind) -> Self {
        Self {
            data: None,
            metadata: None,
            error: Some(ErrorBody {
                code: kind.code(),
                msg: kind.message().to_string(),
                status: true,
            }),
            status: status_for(kind),
        }
    }

    /// HTTP status line this envelope is sent with
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for an error kind.
///
/// The status mirrors the envelope code except for not-found: its envelope
/// code 101 is the protocol-switch status and cannot carry a body, so the
/// status line is 404.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let envelope = Envelope::success(Some(json!([{"user_id": 1}])));
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            json!({"data": [{"user_id": 1}], "metadata": null, "error": null})
        );
        assert_eq!(envelope.status(), StatusCode::OK);
    }

    #[test]
    fn test_empty_success_shape() {
        let value = serde_json::to_value(Envelope::success(None)).unwrap();
        assert_eq!(value, json!({"data": null, "metadata": null, "error": null}));
    }

    #[test]
    fn test_failure_shape() {
        let envelope = Envelope::failure(ErrorKind::Forbidden);
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            json!({
                "data": null,
                "metadata": null,
                "error": {"code": 403, "msg": "403 - Forbidden", "status": true}
            })
        );
        assert_eq!(envelope.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_not_found_status_line() {
        let envelope = Envelope::failure(ErrorKind::NotFound);
        assert_eq!(envelope.error.as_ref().unwrap().code, 101);
        assert_eq!(envelope.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_status_mirrors_code() {
        for kind in [
            ErrorKind::Internal,
            ErrorKind::Unauthorized,
            ErrorKind::Forbidden,
            ErrorKind::BadRequest,
        ] {
            assert_eq!(status_for(kind).as_u16(), kind.code());
        }
    }
}
