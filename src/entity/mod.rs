//! # Entities
//!
//! Wire and row shapes for the `testing_timdaen` resource.

mod record;

pub use record::{BatchInput, Record};
