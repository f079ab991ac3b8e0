// SPDX-License-Identifier: CC0-1.0

//! Secret & output ledger: insert secrets (idempotent, with monotonic flag
//! merging), insert outputs, mark outputs spent, and enumerate balances.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::hdkey::Category;
use crate::recovery::{append_event, LogEvent, RecoveryLog};
use crate::value::{Amount, Digest, PublicWebcash, SecretWebcash};

fn log_event_for(mine: bool, sweep: bool) -> LogEvent {
    match Category::from_flags(mine, sweep) {
        Category::Receive => LogEvent::Recieve,
        Category::Payment => LogEvent::Pay,
        Category::Change => LogEvent::Change,
        Category::Mining => LogEvent::Mining,
    }
}

/// Appends `sk` to the recovery log, then inserts (or idempotently merges)
/// its secret row. Returns the row id of the fresh-or-pre-existing row.
///
/// A recovery-log write failure is logged loudly but does *not* abort —
/// the database insert is still attempted, because the database is the
/// operational source of truth for current state (§4.E, §9 open question).
pub fn add_secret_to_wallet(
    conn: &Connection,
    log: &mut dyn RecoveryLog,
    timestamp: i64,
    sk: &SecretWebcash,
    mine: bool,
    sweep: bool,
) -> Result<i64> {
    let event = log_event_for(mine, sweep);
    if let Err(e) = append_event(log, timestamp as u64, event, &sk.to_string()) {
        log::error!(
            target: "webcash_wallet::ledger",
            "BACKUP THIS KEY NOW: recovery log append failed for secret {}: {e}",
            sk.secret(),
        );
    }

    let secret_hex = sk.secret().to_hex();
    let tx = conn.unchecked_transaction()?;
    let existing: Option<(i64, bool, bool)> = tx
        .query_row(
            "SELECT id, mine, sweep FROM secret WHERE secret = ?1",
            params![secret_hex],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let id = match existing {
        Some((id, old_mine, old_sweep)) => {
            let new_mine = old_mine && mine;
            let new_sweep = old_sweep || sweep;
            tx.execute(
                "UPDATE secret SET mine = ?1, sweep = ?2 WHERE id = ?3",
                params![new_mine, new_sweep, id],
            )?;
            id
        }
        None => {
            tx.execute(
                "INSERT INTO secret (timestamp, secret, mine, sweep) VALUES (?1, ?2, ?3, ?4)",
                params![timestamp, secret_hex, mine, sweep],
            )?;
            tx.last_insert_rowid()
        }
    };
    tx.commit()?;
    Ok(id)
}

/// Inserts a single output row and returns its id.
///
/// `secret_id = None` stores SQL `NULL`: the output is tracked without the
/// wallet holding its preimage.
pub fn add_output_to_wallet(
    conn: &Connection,
    timestamp: i64,
    pk: &PublicWebcash,
    secret_id: Option<i64>,
    spent: bool,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO output (timestamp, hash, secret_id, amount, spent) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![timestamp, pk.hash().as_bytes().to_vec(), secret_id, pk.amount().as_i64(), spent],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Sets `spent = true` on the output with the given row id.
///
/// Monotone: marking an already-spent output spent again is a no-op, not
/// an error.
pub fn mark_output_spent(conn: &Connection, output_id: i64) -> Result<()> {
    conn.execute("UPDATE output SET spent = 1 WHERE id = ?1", params![output_id])?;
    Ok(())
}

/// A single output row, joined with whether the wallet holds its secret.
#[derive(Debug, Clone)]
pub struct WalletOutput {
    /// Row id.
    pub id: i64,
    /// The public hash of the underlying secret.
    pub hash: Digest,
    /// Row id of the owning `secret`, if the wallet holds its preimage.
    pub secret_id: Option<i64>,
    /// The output's amount.
    pub amount: Amount,
    /// Whether this output has been spent.
    pub spent: bool,
}

/// Loads one output by row id, along with the hex secret backing it, if
/// the wallet holds one.
pub fn load_output_with_secret(
    conn: &Connection,
    output_id: i64,
) -> Result<Option<(WalletOutput, Option<String>)>> {
    conn.query_row(
        "SELECT output.id, output.hash, output.secret_id, output.amount, output.spent, secret.secret \
         FROM output LEFT JOIN secret ON output.secret_id = secret.id \
         WHERE output.id = ?1",
        params![output_id],
        |row| {
            let hash_bytes: Vec<u8> = row.get(1)?;
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&hash_bytes);
            let output = WalletOutput {
                id: row.get(0)?,
                hash: Digest::from_bytes(hash),
                secret_id: row.get(2)?,
                amount: Amount::from_i64(row.get(3)?),
                spent: row.get(4)?,
            };
            let secret_hex: Option<String> = row.get(5)?;
            Ok((output, secret_hex))
        },
    )
    .optional()
}

/// Aggregated balances: sums of output amounts split by wallet ownership
/// and spent state.
///
/// `theirs` covers outputs with no owned secret (`secret_id IS NULL`) or
/// whose secret was merged to `mine = false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    /// Unspent amount the wallet owns the secret for.
    pub mine_unspent: i64,
    /// Spent amount the wallet owns the secret for.
    pub mine_spent: i64,
    /// Unspent amount tracked without an owned secret.
    pub theirs_unspent: i64,
    /// Spent amount tracked without an owned secret.
    pub theirs_spent: i64,
}

/// Computes the aggregate [`Balance`] over the whole output table.
pub fn balance(conn: &Connection) -> Result<Balance> {
    conn.query_row(
        "SELECT \
            COALESCE(SUM(CASE WHEN secret.mine = 1 AND output.spent = 0 THEN output.amount ELSE 0 END), 0), \
            COALESCE(SUM(CASE WHEN secret.mine = 1 AND output.spent = 1 THEN output.amount ELSE 0 END), 0), \
            COALESCE(SUM(CASE WHEN (secret.mine IS NULL OR secret.mine = 0) AND output.spent = 0 THEN output.amount ELSE 0 END), 0), \
            COALESCE(SUM(CASE WHEN (secret.mine IS NULL OR secret.mine = 0) AND output.spent = 1 THEN output.amount ELSE 0 END), 0) \
         FROM output LEFT JOIN secret ON output.secret_id = secret.id",
        [],
        |row| {
            Ok(Balance {
                mine_unspent: row.get(0)?,
                mine_spent: row.get(1)?,
                theirs_unspent: row.get(2)?,
                theirs_spent: row.get(3)?,
            })
        },
    )
    .map_err(Into::into)
}

/// A [`Balance`] broken down further by derivation category, for outputs
/// whose secret is bound into a chain. `category = None` means "unused":
/// the secret (if any) isn't yet linked via an `HDKey` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryBalance {
    /// The category, or `None` for "unused".
    pub category: Option<Category>,
    /// Aggregated balance for this category.
    pub balance: Balance,
}

/// Computes balances grouped by category (§3's "enumeration by spent flag,
/// grouping by category").
pub fn category_balances(conn: &Connection) -> Result<Vec<CategoryBalance>> {
    let mut stmt = conn.prepare(
        "SELECT secret.mine, secret.sweep, output.amount, output.spent, hdkey.id \
         FROM output \
         LEFT JOIN secret ON output.secret_id = secret.id \
         LEFT JOIN hdkey ON hdkey.secret_id = secret.id",
    )?;
    let rows = stmt.query_map([], |row| {
        let mine: Option<bool> = row.get(0)?;
        let sweep: Option<bool> = row.get(1)?;
        let amount: i64 = row.get(2)?;
        let spent: bool = row.get(3)?;
        let hdkey_id: Option<i64> = row.get(4)?;
        Ok((mine, sweep, amount, spent, hdkey_id))
    })?;

    let mut totals: Vec<CategoryBalance> = Category::ALL
        .into_iter()
        .map(|c| CategoryBalance { category: Some(c), balance: Balance::default() })
        .collect();
    totals.push(CategoryBalance { category: None, balance: Balance::default() });

    for row in rows {
        let (mine, sweep, amount, spent, hdkey_id) = row?;
        let category = match (hdkey_id, mine, sweep) {
            (Some(_), Some(mine), Some(sweep)) => Some(Category::from_flags(mine, sweep)),
            _ => None,
        };
        let entry = totals.iter_mut().find(|t| t.category == category).expect("all buckets present");
        let is_mine = mine.unwrap_or(false);
        match (is_mine, spent) {
            (true, false) => entry.balance.mine_unspent += amount,
            (true, true) => entry.balance.mine_spent += amount,
            (false, false) => entry.balance.theirs_unspent += amount,
            (false, true) => entry.balance.theirs_spent += amount,
        }
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::mock::InMemoryRecoveryLog;
    use crate::store;
    use crate::value::Digest;

    fn fresh_conn() -> Connection {
        let _ = env_logger::try_init();
        let conn = Connection::open_in_memory().unwrap();
        store::create_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn add_secret_is_idempotent_and_merges_flags() {
        let conn = fresh_conn();
        let mut log = InMemoryRecoveryLog::default();
        let secret = Digest::from_bytes([0x42; 32]);
        let sk = SecretWebcash::new(Amount::from_i64(10), secret);

        let id1 = add_secret_to_wallet(&conn, &mut log, 1, &sk, true, false).unwrap();
        let id2 = add_secret_to_wallet(&conn, &mut log, 2, &sk, false, true).unwrap();
        assert_eq!(id1, id2);

        let (mine, sweep): (bool, bool) = conn
            .query_row("SELECT mine, sweep FROM secret WHERE id = ?1", params![id1], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        // mine: true AND false -> false. sweep: false OR true -> true.
        assert!(!mine);
        assert!(sweep);
    }

    #[test]
    fn mine_never_becomes_true_again() {
        let conn = fresh_conn();
        let mut log = InMemoryRecoveryLog::default();
        let secret = Digest::from_bytes([0x01; 32]);
        let sk = SecretWebcash::new(Amount::from_i64(1), secret);

        add_secret_to_wallet(&conn, &mut log, 1, &sk, false, false).unwrap();
        let id = add_secret_to_wallet(&conn, &mut log, 2, &sk, true, false).unwrap();
        let mine: bool =
            conn.query_row("SELECT mine FROM secret WHERE id = ?1", params![id], |r| r.get(0)).unwrap();
        assert!(!mine);
    }

    #[test]
    fn balance_splits_mine_and_theirs() {
        let conn = fresh_conn();
        let mut log = InMemoryRecoveryLog::default();
        let sk = SecretWebcash::new(Amount::from_i64(10), Digest::from_bytes([1; 32]));
        let secret_id = add_secret_to_wallet(&conn, &mut log, 1, &sk, true, false).unwrap();

        let pk_mine = PublicWebcash::new(Amount::from_i64(10), Digest::from_bytes([2; 32]));
        add_output_to_wallet(&conn, 1, &pk_mine, Some(secret_id), false).unwrap();

        let pk_theirs = PublicWebcash::new(Amount::from_i64(5), Digest::from_bytes([3; 32]));
        add_output_to_wallet(&conn, 1, &pk_theirs, None, false).unwrap();

        let b = balance(&conn).unwrap();
        assert_eq!(b.mine_unspent, 10);
        assert_eq!(b.theirs_unspent, 5);
    }

    #[test]
    fn mark_output_spent_is_monotone() {
        let conn = fresh_conn();
        let pk = PublicWebcash::new(Amount::from_i64(1), Digest::from_bytes([9; 32]));
        let id = add_output_to_wallet(&conn, 1, &pk, None, false).unwrap();
        mark_output_spent(&conn, id).unwrap();
        mark_output_spent(&conn, id).unwrap();
        let spent: bool =
            conn.query_row("SELECT spent FROM output WHERE id = ?1", params![id], |r| r.get(0)).unwrap();
        assert!(spent);
    }
}
