//! # Statement Registry
//!
//! Logical operation name → parameterized SQL, compiled into each pooled
//! connection when that connection is opened.
//!
//! Compilation goes through the connection's prepared-statement cache, so the
//! compiled handles live inside the `Connection` and every later
//! [`StatementRegistry::handle`] call is a cache hit rather than a re-parse.

use std::collections::HashMap;
use std::fmt;

use rusqlite::{CachedStatement, Connection};

use super::errors::{StoreError, StoreResult};

/// Logical names of the registered statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKey {
    LookupByName,
    LookupByCity,
    LookupById,
    Insert,
    Update,
}

impl StatementKey {
    pub fn name(&self) -> &'static str {
        match self {
            StatementKey::LookupByName => "LookupByName",
            StatementKey::LookupByCity => "LookupByCity",
            StatementKey::LookupById => "LookupByID",
            StatementKey::Insert => "Insert",
            StatementKey::Update => "Update",
        }
    }
}

impl fmt::Display for StatementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const Q_LOOKUP_BY_NAME: &str =
    "SELECT UserID, Nama, Usia, Kota, LastUpdate FROM testing_timdaen WHERE Nama = ?1";

const Q_LOOKUP_BY_CITY: &str =
    "SELECT UserID, Nama, Usia, Kota, LastUpdate FROM testing_timdaen WHERE Kota = ?1";

const Q_LOOKUP_BY_ID: &str =
    "SELECT UserID, Nama, Usia, Kota, LastUpdate FROM testing_timdaen WHERE UserID = ?1";

const Q_INSERT: &str = "INSERT INTO testing_timdaen (UserID, Nama, Usia, Kota, LastUpdate)
    VALUES (NULL, ?1, ?2, ?3, CURRENT_TIMESTAMP)";

const Q_UPDATE: &str = "UPDATE testing_timdaen
    SET Nama = ?1, Usia = ?2, Kota = ?3, LastUpdate = CURRENT_TIMESTAMP
    WHERE UserID = ?4";

/// Every statement the record store needs, in registration order
pub const STATEMENTS: [(StatementKey, &str); 5] = [
    (StatementKey::LookupByName, Q_LOOKUP_BY_NAME),
    (StatementKey::LookupByCity, Q_LOOKUP_BY_CITY),
    (StatementKey::LookupById, Q_LOOKUP_BY_ID),
    (StatementKey::Insert, Q_INSERT),
    (StatementKey::Update, Q_UPDATE),
];

/// Read-only after construction; shared by every pooled connection.
#[derive(Debug)]
pub struct StatementRegistry {
    /// Registration order, kept for compilation
    entries: Vec<(StatementKey, &'static str)>,
    queries: HashMap<StatementKey, &'static str>,
}

impl StatementRegistry {
    pub fn new(list: &[(StatementKey, &'static str)]) -> Self {
        Self {
            entries: list.to_vec(),
            queries: list.iter().copied().collect(),
        }
    }

    /// Compile every registered statement into `conn`'s statement cache.
    ///
    /// The first failure aborts. A connection that fails here is never
    /// handed out.
    pub fn compile(&self, conn: &Connection) -> StoreResult<()> {
        conn.set_prepared_statement_cache_capacity(self.entries.len().max(16));

        for (key, query) in &self.entries {
            conn.prepare_cached(query)
                .map_err(|source| StoreError::Prepare {
                    key: key.name(),
                    source,
                })?;
        }

        Ok(())
    }

    /// SQL text registered under `key`.
    ///
    /// # Panics
    ///
    /// If `key` was never registered. That is a wiring defect, not a
    /// runtime condition.
    pub fn query(&self, key: StatementKey) -> &'static str {
        match self.queries.get(&key) {
            Some(query) => query,
            None => panic!("statement {} is not registered", key),
        }
    }

    /// Compiled handle for `key` from the connection's statement cache
    pub fn handle<'conn>(
        &self,
        conn: &'conn Connection,
        key: StatementKey,
    ) -> rusqlite::Result<CachedStatement<'conn>> {
        conn.prepare_cached(self.query(key))
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
