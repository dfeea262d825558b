//! # Auth Client
//!
//! Verifies a request token against an application feature code.
//!
//! The backend contract is
//! `GET {base_url}/v1/auth/check?code=<feature code>` with the caller's
//! `Authorization` header forwarded verbatim and the caller's trace context
//! injected as `traceparent`, answering
//! `{"data": ..., "error": {"status": bool, "msg": string, "code": int}}`.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AuthConfig;
use crate::observability::TraceContext;

use super::errors::{AuthError, AuthResult};

const CHECK_PATH: &str = "/v1/auth/check";

/// Verdict returned by the auth backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(default)]
    pub data: Option<Value>,

    #[serde(default)]
    pub error: AuthStatus,
}

/// Error block of an auth verdict; `status == true` means denied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub status: bool,

    #[serde(default)]
    pub msg: String,

    #[serde(default)]
    pub code: i64,
}

impl Authorization {
    pub fn granted() -> Self {
        Self::default()
    }

    pub fn denied(code: i64, msg: impl Into<String>) -> Self {
        Self {
            data: None,
            error: AuthStatus {
                status: true,
                msg: msg.into(),
                code,
            },
        }
    }

    pub fn is_denied(&self) -> bool {
        self.error.status
    }
}

/// Token verification capability injected into the service layer
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Ask the backend whether `token` may use feature `code`.
    ///
    /// `Err` means no verdict could be obtained.
    async fn check_auth(
        &self,
        ctx: &TraceContext,
        token: &str,
        code: &str,
    ) -> AuthResult<Authorization>;
}

/// [`AuthClient`] over HTTP
pub struct HttpAuthClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl HttpAuthClient {
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        let base_url = Some(config.base_url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self { http, base_url })
    }

    fn check_url(&self) -> AuthResult<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}{}", base, CHECK_PATH))
            .ok_or(AuthError::NotConfigured)
    }
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn check_auth(
        &self,
        ctx: &TraceContext,
        token: &str,
        code: &str,
    ) -> AuthResult<Authorization> {
        let url = self.check_url()?;

        let mut propagation = HeaderMap::new();
        ctx.inject(&mut propagation);

        let mut request = self
            .http
            .get(url)
            .query(&[("code", code)])
            .header(AUTHORIZATION.as_str(), token);
        for (name, value) in &propagation {
            if let Ok(value) = value.to_str() {
                request = request.header(name.as_str(), value);
            }
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::UnexpectedStatus(status.as_u16()));
        }

        Ok(response.json::<Authorization>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_decoding() {
        let granted: Authorization =
            serde_json::from_value(json!({"data": {"user": "x"}, "error": {"status": false}}))
                .unwrap();
        assert!(!granted.is_denied());

        let denied: Authorization = serde_json::from_value(json!({
            "error": {"status": true, "msg": "token expired", "code": 401}
        }))
        .unwrap();
        assert_eq!(denied, Authorization::denied(401, "token expired"));

        let bare: Authorization = serde_json::from_value(json!({})).unwrap();
        assert!(!bare.is_denied());
    }

    #[tokio::test]
    async fn test_unconfigured_client_reports_error() {
        let client = HttpAuthClient::new(&AuthConfig::default()).unwrap();
        let err = client
            .check_auth(&TraceContext::root(), "Token abc", "191")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotConfigured));
    }

    #[test]
    fn test_check_url_trims_trailing_slash() {
        let config = AuthConfig {
            base_url: "http://auth.local/".to_string(),
            ..AuthConfig::default()
        };
        let client = HttpAuthClient::new(&config).unwrap();
        assert_eq!(client.check_url().unwrap(), "http://auth.local/v1/auth/check");
    }
}
