// SPDX-License-Identifier: CC0-1.0

use std::collections::HashMap;

use rusqlite::Connection;

use super::SqlValue;
use crate::error::{Result, WalletError};

/// Splits a source string into top-level `;`-separated statements.
///
/// Splits naively outside of single-quoted string literals; this crate's
/// SQL sources are static schema/mutation text, never user input, so a
/// full SQL tokenizer isn't warranted.
fn split_statements(source: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let bytes = source.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_quote = !in_quote,
            b';' if !in_quote => {
                let stmt = source[start..i].trim();
                if !stmt.is_empty() {
                    statements.push(stmt);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = source[start..].trim();
    if !tail.is_empty() {
        statements.push(tail);
    }
    statements
}

/// Executes every statement in `source` against `conn`, binding every
/// recognised named placeholder (`:name`) present in `params`.
///
/// Placeholders in a statement that have no entry in `params` are left
/// unbound (and so are `NULL`, per SQLite's default); entries in `params`
/// that name a placeholder absent from the current statement are silently
/// skipped. A step result other than "done" — including a statement that
/// unexpectedly returns rows — stops execution and returns the error, with
/// the offending statement logged for diagnostics.
pub fn execute_multi(
    conn: &Connection,
    source: &str,
    params: &HashMap<String, SqlValue>,
) -> Result<()> {
    for statement in split_statements(source) {
        let mut stmt = conn.prepare(statement)?;
        for i in 1..=stmt.parameter_count() {
            if let Some(name) = stmt.parameter_name(i) {
                let key = name.trim_start_matches(':');
                if let Some(value) = params.get(key) {
                    stmt.raw_bind_parameter(i, value)?;
                }
            }
        }
        if let Err(e) = stmt.raw_execute() {
            log::error!(target: "webcash_wallet::sql", "statement failed: {statement}: {e}");
            return Err(WalletError::Sql(e));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, SqlValue)]) -> HashMap<String, SqlValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn splits_multiple_statements() {
        let stmts = split_statements("CREATE TABLE a (x INT); CREATE TABLE b (y INT);");
        assert_eq!(stmts, vec!["CREATE TABLE a (x INT)", "CREATE TABLE b (y INT)"]);
    }

    #[test]
    fn ignores_semicolons_in_string_literals() {
        let stmts = split_statements("INSERT INTO t VALUES ('a;b'); SELECT 1;");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t VALUES ('a;b')");
    }

    #[test]
    fn binds_named_placeholders_and_skips_extras() {
        let conn = Connection::open_in_memory().unwrap();
        execute_multi(&conn, "CREATE TABLE t (id INTEGER, name TEXT)", &HashMap::new()).unwrap();
        let p = params(&[
            ("id", SqlValue::Integer(1)),
            ("name", SqlValue::Text("alice".into())),
            ("unused", SqlValue::Integer(99)),
        ]);
        execute_multi(&conn, "INSERT INTO t (id, name) VALUES (:id, :name)", &p).unwrap();
        let name: String =
            conn.query_row("SELECT name FROM t WHERE id = 1", [], |row| row.get(0)).unwrap();
        assert_eq!(name, "alice");
    }

    #[test]
    fn rejects_statement_returning_rows() {
        let conn = Connection::open_in_memory().unwrap();
        let err = execute_multi(&conn, "SELECT 1", &HashMap::new());
        assert!(err.is_err());
    }
}
