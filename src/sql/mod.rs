// SPDX-License-Identifier: CC0-1.0

//! Tagged SQL value union and a multi-statement executor with named
//! parameter binding.
//!
//! This is a thin layer over [`rusqlite`], not a reuse of
//! `rusqlite::types::Value`: the spec's binding layer needs a distinct
//! `Bool` tag, which SQLite (and therefore `rusqlite::types::Value`)
//! doesn't carry — SQLite stores booleans as integers.

mod executor;
mod value;

pub use executor::execute_multi;
pub use value::SqlValue;
