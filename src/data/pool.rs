//! # Connection Pool
//!
//! `deadpool` manager for SQLite. Each connection is opened on the blocking
//! pool and has every registered statement compiled before it is handed out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use deadpool::managed::{Metrics, PoolError, RecycleResult};
use rusqlite::Connection;

use super::errors::{StoreError, StoreResult};
use super::statements::StatementRegistry;

/// How long a writer waits on SQLite's file lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteConnector {
    path: PathBuf,
    statements: Arc<StatementRegistry>,
}

impl deadpool::managed::Manager for SqliteConnector {
    type Type = Connection;
    type Error = StoreError;

    async fn create(&self) -> StoreResult<Connection> {
        let path = self.path.clone();
        let statements = Arc::clone(&self.statements);

        tokio::task::spawn_blocking(move || -> StoreResult<Connection> {
            tracing::debug!(path = %path.display(), "opening database connection");
            let conn = Connection::open(&path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            statements.compile(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }

    async fn recycle(&self, _: &mut Connection, _: &Metrics) -> RecycleResult<StoreError> {
        // SQLite connections to a local file do not go stale.
        Ok(())
    }
}

pub type Pool = deadpool::managed::Pool<SqliteConnector>;
pub type PooledConnection = deadpool::managed::Object<SqliteConnector>;

pub fn build(
    path: impl Into<PathBuf>,
    statements: Arc<StatementRegistry>,
    max_size: usize,
) -> StoreResult<Pool> {
    let connector = SqliteConnector {
        path: path.into(),
        statements,
    };

    Pool::builder(connector)
        .max_size(max_size)
        .build()
        .map_err(|err| StoreError::Pool(err.to_string()))
}

/// Check out a connection, opening one if the pool has room
pub async fn get(pool: &Pool) -> StoreResult<PooledConnection> {
    match pool.get().await {
        Ok(conn) => Ok(conn),
        Err(PoolError::Backend(err)) => Err(err),
        Err(err) => Err(StoreError::Pool(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::create_table;
    use crate::data::statements::STATEMENTS;

    fn registry() -> Arc<StatementRegistry> {
        Arc::new(StatementRegistry::new(&STATEMENTS))
    }

    #[tokio::test]
    async fn test_connections_are_compiled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.db");
        create_table(&Connection::open(&path).unwrap()).unwrap();

        let pool = build(&path, registry(), 2).unwrap();
        let first = get(&pool).await.unwrap();
        let second = get(&pool).await.unwrap();

        assert_eq!(pool.status().size, 2);
        drop((first, second));
        assert_eq!(pool.status().available, 2);
    }

    #[tokio::test]
    async fn test_missing_table_fails_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let pool = build(dir.path().join("empty.db"), registry(), 1).unwrap();

        let err = get(&pool).await.err().unwrap();
        assert!(matches!(err, StoreError::Prepare { key: "LookupByName", .. }));
    }
}
