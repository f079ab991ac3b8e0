// SPDX-License-Identifier: CC0-1.0

//! Terms-of-service ledger: an append-only record of accepted legal texts.

use rusqlite::{params, Connection};

use crate::error::Result;

/// Does the `term` table contain any row at all?
pub fn have_accepted_terms(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM term", [], |row| row.get(0))?;
    Ok(count > 0)
}

/// Does a row with exactly this `body` exist? Byte-exact match.
pub fn are_terms_accepted(conn: &Connection, body: &str) -> Result<bool> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM term WHERE body = ?1", params![body], |row| row.get(0))?;
    Ok(count > 0)
}

/// Records `body` as accepted at `timestamp`, unless already recorded.
pub fn accept_terms(conn: &Connection, timestamp: i64, body: &str) -> Result<()> {
    if are_terms_accepted(conn, body)? {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO term (timestamp, body) VALUES (?1, ?2)",
        params![timestamp, body],
    )?;
    Ok(())
}
