//! # Record Store
//!
//! Typed CRUD over `testing_timdaen`, one registered statement per operation.
//!
//! Every call checks out a pooled connection and runs its statement on the
//! blocking pool, so requests never wait on each other for a connection lock
//! and never stall a runtime worker. Each call opens a child trace span
//! tagged with the datastore, table and SQL text, and wraps any failure with
//! a `[DATA][<operation>]` tag.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, CachedStatement, Row};
use tracing::Instrument;

use crate::config::DatabaseConfig;
use crate::entity::Record;
use crate::errors::{AppError, AppResult};
use crate::observability::TraceContext;

use super::errors::{StoreError, StoreResult};
use super::pool::{self, Pool};
use super::schema::TABLE;
use super::statements::{StatementKey, StatementRegistry, STATEMENTS};

/// SQLite's `CURRENT_TIMESTAMP` text layout (UTC)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Data access capability used by the service layer
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records whose name matches exactly, in table order
    async fn lookup_by_name(&self, ctx: &TraceContext, name: &str) -> AppResult<Vec<Record>>;

    /// All records whose city matches exactly, in table order
    async fn lookup_by_city(&self, ctx: &TraceContext, city: &str) -> AppResult<Vec<Record>>;

    /// The record with `id`; no match is a not-found error
    async fn lookup_by_id(&self, ctx: &TraceContext, id: i64) -> AppResult<Record>;

    /// Insert name/age/city and return the generated id
    async fn insert(&self, ctx: &TraceContext, record: &Record) -> AppResult<i64>;

    /// Overwrite name/age/city of `record.id`, returning affected rows.
    ///
    /// An id with no row is not an error; it affects zero rows.
    async fn update(&self, ctx: &TraceContext, record: &Record) -> AppResult<usize>;
}

/// [`RecordStore`] over a pool of SQLite connections
pub struct SqliteRecordStore {
    pool: Pool,
    statements: Arc<StatementRegistry>,
    /// Reported as `db.name` on spans
    database: String,
}

impl SqliteRecordStore {
    /// Build the pool and open a first connection.
    ///
    /// Fails when the database cannot be opened or any registered statement
    /// does not compile against it.
    pub async fn open(config: &DatabaseConfig) -> StoreResult<Self> {
        let statements = Arc::new(StatementRegistry::new(&STATEMENTS));
        let pool = pool::build(
            &config.path,
            Arc::clone(&statements),
            config.max_connections,
        )?;

        drop(pool::get(&pool).await?);
        tracing::info!(
            path = %config.path.display(),
            statements = statements.len(),
            max_connections = config.max_connections,
            "database ready"
        );

        Ok(Self {
            pool,
            statements,
            database: config.name.clone(),
        })
    }

    async fn execute<T, F>(
        &self,
        ctx: &TraceContext,
        key: StatementKey,
        layer: &'static str,
        run: F,
    ) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut CachedStatement<'_>) -> StoreResult<T> + Send + 'static,
    {
        let ctx = ctx.db_child(&self.database, TABLE, self.statements.query(key));

        async {
            self.run_statement(key, run).await.map_err(|err| {
                tracing::error!(statement = %key, error = %err, "SQL query failed");
                AppError::from(err).wrap(layer)
            })
        }
        .instrument(ctx.span().clone())
        .await
    }

    async fn run_statement<T, F>(&self, key: StatementKey, run: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut CachedStatement<'_>) -> StoreResult<T> + Send + 'static,
    {
        let conn = pool::get(&self.pool).await?;
        let statements = Arc::clone(&self.statements);

        tokio::task::spawn_blocking(move || {
            let mut stmt = statements.handle(&conn, key)?;
            run(&mut stmt)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn lookup_by_name(&self, ctx: &TraceContext, name: &str) -> AppResult<Vec<Record>> {
        let name = name.to_string();
        self.execute(
            ctx,
            StatementKey::LookupByName,
            "[DATA][LookupByName]",
            move |stmt| {
                // A bad row fails the whole lookup; rows scanned before it are dropped.
                let rows = stmt.query_map(params![name], scan_record)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            },
        )
        .await
    }

    async fn lookup_by_city(&self, ctx: &TraceContext, city: &str) -> AppResult<Vec<Record>> {
        let city = city.to_string();
        self.execute(
            ctx,
            StatementKey::LookupByCity,
            "[DATA][LookupByCity]",
            move |stmt| {
                let rows = stmt.query_map(params![city], scan_record)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            },
        )
        .await
    }

    async fn lookup_by_id(&self, ctx: &TraceContext, id: i64) -> AppResult<Record> {
        self.execute(
            ctx,
            StatementKey::LookupById,
            "[DATA][LookupByID]",
            move |stmt| {
                stmt.query_row(params![id], scan_record)
                    .map_err(|err| match err {
                        rusqlite::Error::QueryReturnedNoRows => StoreError::RecordNotFound(id),
                        other => other.into(),
                    })
            },
        )
        .await
    }

    async fn insert(&self, ctx: &TraceContext, record: &Record) -> AppResult<i64> {
        let record = record.clone();
        self.execute(ctx, StatementKey::Insert, "[DATA][Insert]", move |stmt| {
            Ok(stmt.insert(params![record.name, record.age, record.city])?)
        })
        .await
    }

    async fn update(&self, ctx: &TraceContext, record: &Record) -> AppResult<usize> {
        let record = record.clone();
        self.execute(ctx, StatementKey::Update, "[DATA][Update]", move |stmt| {
            let id = record.id.ok_or(StoreError::MissingId)?;
            Ok(stmt.execute(params![record.name, record.age, record.city, id])?)
        })
        .await
    }
}

fn scan_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let last_update: String = row.get(4)?;
    let last_update = NaiveDateTime::parse_from_str(&last_update, TIMESTAMP_FORMAT)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(err)))?;

    Ok(Record {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        age: row.get(2)?,
        city: row.get(3)?,
        last_update: Some(Utc.from_utc_datetime(&last_update)),
    })
}
