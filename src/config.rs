//! # Configuration
//!
//! One JSON document, passed by value to the constructors that need it.
//! Every field has a default so a partial file is valid.
//!
//! ```json
//! {
//!   "server":   { "host": "0.0.0.0", "port": 8080, "cors_origins": [] },
//!   "database": { "path": "./timdaen.db", "name": "timdaen", "max_connections": 4 },
//!   "auth":     { "base_url": "http://auth:9000", "feature_code": "191", "required": false },
//!   "telemetry": { "endpoint": "http://otel-collector:4317", "service_name": "testing" },
//!   "log_format": "json"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_server::HttpServerConfig;
use crate::observability::{LogFormat, TelemetryConfig};

/// Where Kubernetes mounts the pod's namespace
const NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

const NAMESPACE_STAGING: &str = "jx-staging";
const NAMESPACE_PRODUCTION: &str = "jx-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: HttpServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub log_format: LogFormat,
}

/// SQLite location, pool size and the name reported on spans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; every pooled connection opens it, so `:memory:` is rejected
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_database_name")]
    pub name: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./timdaen.db")
}

fn default_database_name() -> String {
    "timdaen".to_string()
}

fn default_max_connections() -> usize {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            name: default_database_name(),
            max_connections: default_max_connections(),
        }
    }
}

/// Auth backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Backend root, e.g. `http://auth:9000`; empty means not configured
    #[serde(default)]
    pub base_url: String,

    /// Feature code tokens are checked against
    #[serde(default = "default_feature_code")]
    pub feature_code: String,

    /// Check every request's token before dispatch
    #[serde(default)]
    pub required: bool,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_feature_code() -> String {
    "191".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            feature_code: default_feature_code(),
            required: false,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Default config file for the environment this process runs in
    pub fn default_path() -> PathBuf {
        let namespace = fs::read_to_string(NAMESPACE_FILE).ok();
        Self::path_for_namespace(namespace.as_deref())
    }

    /// Map a Kubernetes namespace to its config file
    pub fn path_for_namespace(namespace: Option<&str>) -> PathBuf {
        match namespace.map(str::trim) {
            Some(NAMESPACE_STAGING) => PathBuf::from("./timdaen.staging.json"),
            Some(NAMESPACE_PRODUCTION) => PathBuf::from("./timdaen.production.json"),
            _ => PathBuf::from("./timdaen.development.json"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be > 0".to_string()));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database.path must not be empty".to_string(),
            ));
        }

        if self.database.path.as_os_str() == ":memory:" {
            return Err(ConfigError::Invalid(
                "database.path must be a file; pooled connections cannot share :memory:"
                    .to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be > 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.telemetry.sample_rate) {
            return Err(ConfigError::Invalid(
                "telemetry.sample_rate must be within 0..=1".to_string(),
            ));
        }

        if self.auth.feature_code.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.feature_code must not be empty".to_string(),
            ));
        }

        if self.auth.required && self.auth.base_url.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.required needs auth.base_url".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let file = write_config("{}");
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.name, "timdaen");
        assert_eq!(config.database.max_connections, 4);
        assert!(config.telemetry.endpoint.is_empty());
        assert_eq!(config.auth.feature_code, "191");
        assert!(!config.auth.required);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_partial_sections() {
        let file = write_config(
            r#"{"server": {"port": 9090}, "auth": {"base_url": "http://auth", "required": true}}"#,
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.auth.required);
        assert_eq!(config.auth.timeout_ms, 5000);
    }

    #[test]
    fn test_required_auth_needs_url() {
        let file = write_config(r#"{"auth": {"required": true}}"#);
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_port_rejected() {
        let file = write_config(r#"{"server": {"port": 0}}"#);
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_pool_settings_validated() {
        let file = write_config(r#"{"database": {"max_connections": 0}}"#);
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        let file = write_config(r#"{"database": {"path": ":memory:"}}"#);
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_telemetry_section() {
        let file = write_config(
            r#"{"telemetry": {"endpoint": "http://collector:4317", "sample_rate": 0.25}}"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.telemetry.endpoint, "http://collector:4317");
        assert_eq!(config.telemetry.sample_rate, 0.25);
        assert_eq!(config.telemetry.service_name, "testing");

        let file = write_config(r#"{"telemetry": {"sample_rate": 1.5}}"#);
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bad_json() {
        let file = write_config("{ not json");
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/timdaen.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_path_for_namespace() {
        assert_eq!(
            Config::path_for_namespace(Some("jx-staging\n")),
            PathBuf::from("./timdaen.staging.json")
        );
        assert_eq!(
            Config::path_for_namespace(Some("jx-production")),
            PathBuf::from("./timdaen.production.json")
        );
        assert_eq!(
            Config::path_for_namespace(Some("default")),
            PathBuf::from("./timdaen.development.json")
        );
        assert_eq!(
            Config::path_for_namespace(None),
            PathBuf::from("./timdaen.development.json")
        );
    }
}
