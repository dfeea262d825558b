//! CLI command implementations
//!
//! `serve` boots in a fixed order and any failure before the listener is up
//! is fatal:
//!
//! 1. Configuration load (explicit path, or the namespace default)
//! 2. Tokio runtime
//! 3. Logging and the OpenTelemetry tracer provider
//! 4. Connection pool and statement preparation
//! 5. Auth client
//! 6. HTTP listener, until Ctrl-C; buffered spans are flushed on the way out

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::HttpAuthClient;
use crate::config::Config;
use crate::data::{create_table, SqliteRecordStore};
use crate::http_server::{AuthPolicy, Dispatcher, HttpServer};
use crate::observability::{logging, telemetry};
use crate::service::RecordService;

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&resolve_config_path(config)),
        Command::Serve { config, port } => serve(&resolve_config_path(config), port),
    }
}

fn resolve_config_path(config: Option<PathBuf>) -> PathBuf {
    config.unwrap_or_else(Config::default_path)
}

/// Load configuration, applying a port override when given
pub fn load_config(config_path: &Path, port: Option<u16>) -> CliResult<Config> {
    let mut config = Config::load(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
        config.validate()?;
    }
    Ok(config)
}

/// Create the records table if it does not exist
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path, None)?;

    let conn = rusqlite::Connection::open(&config.database.path).map_err(|e| {
        CliError::database_error(format!(
            "failed to open {}: {}",
            config.database.path.display(),
            e
        ))
    })?;
    create_table(&conn)
        .map_err(|e| CliError::database_error(format!("failed to create table: {}", e)))?;

    println!("initialized {}", config.database.path.display());
    Ok(())
}

/// Start the HTTP service and block until shutdown
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let config = load_config(config_path, port)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::boot_failed(format!("failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        // The batch span exporter needs a running runtime.
        let provider = logging::init(config.log_format, &config.telemetry)
            .map_err(|e| CliError::boot_failed(format!("failed to install logger: {}", e)))?;

        tracing::info!(
            config = %config_path.display(),
            otlp_endpoint = %config.telemetry.endpoint,
            "configuration loaded"
        );

        let result = run_server(&config).await;
        telemetry::shutdown(&provider);
        result
    })
}

async fn run_server(config: &Config) -> CliResult<()> {
    let store = SqliteRecordStore::open(&config.database).await.map_err(|e| {
        tracing::error!(error = %e, path = %config.database.path.display(), "database boot failed");
        CliError::database_error(format!("{} (run `timdaen init` to create the table)", e))
    })?;

    let auth = HttpAuthClient::new(&config.auth)
        .map_err(|e| CliError::boot_failed(format!("failed to build auth client: {}", e)))?;

    let service = RecordService::new(Arc::new(store), Arc::new(auth));
    let dispatcher = Arc::new(Dispatcher::new(service, AuthPolicy::from(&config.auth)));
    let server = HttpServer::new(config.server.clone(), dispatcher);

    server
        .start(shutdown_signal())
        .await
        .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::errors::CliErrorCode;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("timdaen.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_config_port_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"{"server": {"port": 8080}}"#);

        let config = load_config(&path, Some(9100)).unwrap();
        assert_eq!(config.server.port, 9100);

        let err = load_config(&path, Some(0)).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[tokio::test]
    async fn test_init_creates_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("records.db");
        let body = format!(r#"{{"database": {{"path": {:?}}}}}"#, db.to_str().unwrap());
        let path = write_config(&dir, &body);

        init(&path).unwrap();
        // running twice is harmless
        init(&path).unwrap();

        let config = load_config(&path, None).unwrap();
        assert!(SqliteRecordStore::open(&config.database).await.is_ok());
    }

    #[test]
    fn test_init_missing_config() {
        let err = init(Path::new("/nonexistent/timdaen.json")).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }
}
