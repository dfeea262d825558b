//! # Record
//!
//! A person row. JSON field names follow the table's Indonesian column names
//! (`nama`, `usia`, `kota`) because existing clients depend on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single row of `testing_timdaen`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Server-generated primary key; absent on insert input
    #[serde(rename = "user_id", default)]
    pub id: Option<i64>,

    #[serde(rename = "nama", default)]
    pub name: String,

    #[serde(rename = "usia", default)]
    pub age: i64,

    #[serde(rename = "kota", default)]
    pub city: String,

    /// Set by the database on every write; ignored on input
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

impl Record {
    /// Build an insert payload (no id, no timestamp)
    pub fn new(name: impl Into<String>, age: i64, city: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            age,
            city: city.into(),
            last_update: None,
        }
    }

    /// Same record addressed at an existing id
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Request body for batch operations.
///
/// Which field is populated implies the operation: `user_id` for multi-lookup,
/// `users` for batch insert. A missing field reads as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchInput {
    #[serde(rename = "user_id", default)]
    pub ids: Vec<i64>,

    #[serde(rename = "users", default)]
    pub records: Vec<Record>,
}
