// SPDX-License-Identifier: CC0-1.0

//! Store lifecycle: opens the database and recovery log, takes an
//! exclusive inter-process file lock, and runs idempotent schema
//! migration.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::FileExt;
use rusqlite::Connection;

use crate::error::{Result, WalletError};
use crate::hdkey::{self, HdRoot};
use crate::recovery::{FileRecoveryLog, RecoveryLog};
use crate::sql::execute_multi;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS hdroot (
    id INTEGER PRIMARY KEY,
    timestamp INTEGER NOT NULL,
    version INTEGER NOT NULL,
    secret BLOB NOT NULL,
    UNIQUE (version, secret)
);
CREATE TABLE IF NOT EXISTS hdchain (
    id INTEGER PRIMARY KEY,
    hdroot_id INTEGER NOT NULL REFERENCES hdroot(id),
    chaincode INTEGER NOT NULL,
    mine BOOLEAN NOT NULL,
    sweep BOOLEAN NOT NULL,
    mindepth INTEGER NOT NULL,
    maxdepth INTEGER NOT NULL,
    UNIQUE (hdroot_id, chaincode, mine, sweep)
);
CREATE TABLE IF NOT EXISTS secret (
    id INTEGER PRIMARY KEY,
    timestamp INTEGER NOT NULL,
    secret TEXT NOT NULL UNIQUE,
    mine BOOLEAN NOT NULL,
    sweep BOOLEAN NOT NULL
);
CREATE TABLE IF NOT EXISTS hdkey (
    id INTEGER PRIMARY KEY,
    hdchain_id INTEGER NOT NULL REFERENCES hdchain(id),
    depth INTEGER NOT NULL,
    secret_id INTEGER NOT NULL UNIQUE REFERENCES secret(id),
    UNIQUE (hdchain_id, depth)
);
CREATE TABLE IF NOT EXISTS output (
    id INTEGER PRIMARY KEY,
    timestamp INTEGER NOT NULL,
    hash BLOB NOT NULL,
    secret_id INTEGER REFERENCES secret(id),
    amount INTEGER NOT NULL,
    spent BOOLEAN NOT NULL
);
CREATE TABLE IF NOT EXISTS term (
    id INTEGER PRIMARY KEY,
    timestamp INTEGER NOT NULL,
    body TEXT NOT NULL UNIQUE
);
";

/// Runs the `CREATE TABLE IF NOT EXISTS` migration for all six tables.
///
/// Idempotent: safe to call against an already-migrated database.
pub(crate) fn create_schema(conn: &Connection) -> Result<()> {
    execute_multi(conn, SCHEMA_SQL, &HashMap::new())
}

/// Owns the two sibling files a wallet base path resolves to (`P.db`, the
/// locked relational database, and `P.bak`, the append-only recovery log)
/// plus the loaded HD root.
pub struct Store {
    /// Kept open for the lifetime of the `Store` so the advisory lock
    /// taken in [`Store::open`] stays held; released on drop.
    _lock_file: File,
    pub(crate) conn: Connection,
    pub(crate) recovery_log: Box<dyn RecoveryLog>,
    pub(crate) root: HdRoot,
}

fn db_path(base: &Path) -> PathBuf {
    let mut p = base.as_os_str().to_owned();
    p.push(".db");
    PathBuf::from(p)
}

fn log_path(base: &Path) -> PathBuf {
    let mut p = base.as_os_str().to_owned();
    p.push(".bak");
    PathBuf::from(p)
}

impl Store {
    /// Opens (creating if absent) the database and recovery log at base
    /// path `base`, takes the exclusive non-blocking file lock, runs
    /// schema migration, and loads or creates the HD root.
    ///
    /// `now` is the current UNIX-epoch timestamp, supplied by the caller
    /// rather than read from the clock here, so root creation is
    /// deterministic in tests.
    pub fn open(base: &Path, now: i64) -> Result<Store> {
        let db_path = db_path(base);
        let lock_file = OpenOptions::new().read(true).write(true).create(true).open(&db_path)?;
        lock_file.try_lock_exclusive().map_err(|_| WalletError::WalletInUse)?;

        let conn = Connection::open(&db_path)?;
        log::info!(target: "webcash_wallet::store", "opened database at {}", db_path.display());

        create_schema(&conn)?;

        let mut recovery_log: Box<dyn RecoveryLog> = Box::new(FileRecoveryLog::open(&log_path(base))?);
        let root = hdkey::get_or_create_hd_root(&conn, recovery_log.as_mut(), now)?;

        Ok(Store { _lock_file: lock_file, conn, recovery_log, root })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_wallet_bootstrap_creates_sibling_files() {
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("wallet");
        let store = Store::open(&base, 1_000_000).unwrap();
        drop(store);

        assert!(db_path(&base).exists());
        assert!(log_path(&base).exists());

        let contents = std::fs::read_to_string(log_path(&base)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with(char::is_numeric));
        assert!(lines[0].contains(" hdroot "));
        assert!(lines[0].ends_with("version=1"));

        let conn = Connection::open(db_path(&base)).unwrap();
        let root_count: i64 = conn.query_row("SELECT COUNT(*) FROM hdroot", [], |r| r.get(0)).unwrap();
        assert_eq!(root_count, 1);
        let chain_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM hdchain", [], |r| r.get(0)).unwrap();
        assert_eq!(chain_count, 4);
        let maxdepths: i64 =
            conn.query_row("SELECT SUM(maxdepth) FROM hdchain", [], |r| r.get(0)).unwrap();
        assert_eq!(maxdepths, 0);
    }

    #[test]
    fn second_process_lock_fails_fast() {
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("wallet");
        let first = Store::open(&base, 1).unwrap();

        let second = Store::open(&base, 1);
        assert!(matches!(second, Err(WalletError::WalletInUse)));

        drop(first);
    }
}
