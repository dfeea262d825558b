//! # Data Layer
//!
//! Prepared-statement access to the `testing_timdaen` table over a pool of
//! SQLite connections.

mod errors;
mod pool;
pub mod schema;
pub mod statements;
mod store;

pub use errors::{StoreError, StoreResult};
pub use pool::{Pool, SqliteConnector};
pub use schema::{create_table, TABLE};
pub use statements::{StatementKey, StatementRegistry, STATEMENTS};
pub use store::{RecordStore, SqliteRecordStore};
