//! timdaen - record lookup and maintenance service
//!
//! A single `/testing` HTTP endpoint over one SQLite table, with token
//! checks against an external auth backend and W3C trace propagation
//! through every layer.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data;
pub mod entity;
pub mod errors;
pub mod http_server;
pub mod observability;
pub mod service;
