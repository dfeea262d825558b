//! # HTTP Server Module
//!
//! Axum server for the record service.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/testing` - Record lookups, batch insert, update (see [`dispatcher`])

pub mod config;
pub mod dispatcher;
pub mod envelope;
mod health_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use dispatcher::{testing_routes, AuthPolicy, Dispatcher, Route};
pub use envelope::Envelope;
pub use server::HttpServer;
