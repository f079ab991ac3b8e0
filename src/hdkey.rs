// SPDX-License-Identifier: CC0-1.0

//! HD key engine: root creation/load, deterministic per-chain derivation,
//! and the bit-level category encoding that is part of the wallet's
//! durable derivation contract.

use core::fmt;

use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest as ShaDigest, Sha256};
use zeroize::Zeroize;

use crate::error::{Result, WalletError};
use crate::recovery::{append_event, LogEvent, RecoveryLog};
use crate::value::Digest;

/// A `(mine, sweep)` derivation category, named per §3.
///
/// Every `HDChain` row is one of these four; a secret that is not (yet)
/// bound to any chain is described as "unused" by callers, but that is a
/// property of the absence of an `HDKey` row, not a fifth `Category`
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// `(mine=false, sweep=true)`.
    Receive,
    /// `(mine=false, sweep=false)`.
    Payment,
    /// `(mine=true, sweep=false)`.
    Change,
    /// `(mine=true, sweep=true)`.
    Mining,
}

impl Category {
    /// All four categories, in bit-encoding order.
    pub const ALL: [Category; 4] =
        [Category::Receive, Category::Payment, Category::Change, Category::Mining];

    /// Maps `(mine, sweep)` to its category.
    pub fn from_flags(mine: bool, sweep: bool) -> Self {
        match (mine, sweep) {
            (false, true) => Category::Receive,
            (false, false) => Category::Payment,
            (true, false) => Category::Change,
            (true, true) => Category::Mining,
        }
    }

    /// The `(mine, sweep)` pair this category encodes.
    pub fn flags(self) -> (bool, bool) {
        match self {
            Category::Receive => (false, true),
            Category::Payment => (false, false),
            Category::Change => (true, false),
            Category::Mining => (true, true),
        }
    }

    /// The 2-bit encoding ORed into the bottom of the chaincode word.
    ///
    /// `(F,T)->0, (F,F)->1, (T,F)->2, (T,T)->3`. This is part of the
    /// wallet's durable derivation contract and must never change.
    pub fn bits(self) -> u8 {
        match self {
            Category::Receive => 0,
            Category::Payment => 1,
            Category::Change => 2,
            Category::Mining => 3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Category::Receive => "receive",
            Category::Payment => "payment",
            Category::Change => "change",
            Category::Mining => "mining",
        };
        write!(f, "{name}")
    }
}

/// A freshly derived or loaded secret bound to a derivation path.
#[derive(Debug, Clone)]
pub struct WalletSecret {
    /// Row id of the `secret` table entry. Always populated from the
    /// insert's row id (never left uninitialised, per the design note).
    pub id: i64,
    /// The derived secret, as 64 lowercase hex characters.
    pub secret_hex: String,
}

const DERIVATION_TAG_INPUT: &str = "webcashwalletv1";
const ROOT_MIN_LEN: usize = 16;
const ROOT_MAX_LEN: usize = 32;
const ROOT_VERSION: i64 = 1;

fn derivation_tag() -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DERIVATION_TAG_INPUT.as_bytes());
    hasher.finalize().into()
}

/// Encodes the chaincode word: the upper 62 bits are `chaincode << 2`, the
/// bottom 2 bits are the category encoding, as 8 big-endian bytes.
fn encode_chaincode(chaincode: u64, category: Category) -> [u8; 8] {
    let word = (chaincode << 2) | category.bits() as u64;
    word.to_be_bytes()
}

fn encode_depth(depth: u64) -> [u8; 8] { depth.to_be_bytes() }

/// Derives the secret at `(root, chaincode, category, depth)`.
///
/// `secret := SHA256(tag || tag || root || chaincode_bytes || depth_bytes)`
/// where `tag := SHA256("webcashwalletv1")`. Deterministic: identical
/// inputs always produce byte-identical output (§8).
pub fn derive(root: &[u8; 32], chaincode: u64, category: Category, depth: u64) -> Digest {
    let tag = derivation_tag();
    let chaincode_bytes = encode_chaincode(chaincode, category);
    let depth_bytes = encode_depth(depth);

    let mut hasher = Sha256::new();
    hasher.update(tag);
    hasher.update(tag);
    hasher.update(root);
    hasher.update(chaincode_bytes);
    hasher.update(depth_bytes);
    let mut raw: [u8; 32] = hasher.finalize().into();
    let digest = Digest::from_bytes(raw);
    raw.zeroize();
    digest
}

/// The in-memory HD root: a 32-byte buffer, zeroised on drop.
///
/// Read-only after load; the only mutation is teardown.
pub struct HdRoot {
    id: i64,
    bytes: [u8; 32],
}

impl Drop for HdRoot {
    fn drop(&mut self) { self.bytes.zeroize(); }
}

impl HdRoot {
    /// Row id of the `hdroot` entry.
    pub fn id(&self) -> i64 { self.id }

    /// The 32-byte working buffer (short roots are right-padded with
    /// zeros when loaded).
    pub fn bytes(&self) -> &[u8; 32] { &self.bytes }

    /// Derives the secret for `(chaincode=0, category, depth)` on this
    /// root. Chaincode 0 is the only value this core's chains use (§4.D).
    pub fn derive(&self, category: Category, depth: u64) -> Digest {
        derive(&self.bytes, 0, category, depth)
    }
}

/// Loads the sole `hdroot` row, or creates one plus the four initial
/// chains if the table is empty. More than one row is fatal (§4.D).
pub fn get_or_create_hd_root(
    conn: &Connection,
    log: &mut dyn RecoveryLog,
    timestamp: i64,
) -> Result<HdRoot> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM hdroot", [], |row| row.get(0))?;
    if count > 1 {
        return Err(WalletError::MultipleHdRoots);
    }
    if count == 1 {
        return load_hd_root(conn);
    }
    create_hd_root(conn, log, timestamp)
}

fn load_hd_root(conn: &Connection) -> Result<HdRoot> {
    let (id, version, secret): (i64, i64, Vec<u8>) = conn.query_row(
        "SELECT id, version, secret FROM hdroot",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    if version != ROOT_VERSION {
        return Err(WalletError::UnsupportedRootVersion(version));
    }
    if secret.len() < ROOT_MIN_LEN || secret.len() > ROOT_MAX_LEN {
        return Err(WalletError::InvalidRootLength(secret.len()));
    }
    let mut bytes = [0u8; 32];
    bytes[..secret.len()].copy_from_slice(&secret);
    Ok(HdRoot { id, bytes })
}

fn create_hd_root(conn: &Connection, log: &mut dyn RecoveryLog, timestamp: i64) -> Result<HdRoot> {
    let mut raw = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut raw);
    let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();

    append_event(log, timestamp as u64, LogEvent::HdRoot, &format!("{hex} version=1"))?;

    conn.execute(
        "INSERT INTO hdroot (timestamp, version, secret) VALUES (?1, ?2, ?3)",
        params![timestamp, ROOT_VERSION, raw.to_vec()],
    )?;
    let id = conn.last_insert_rowid();

    for category in Category::ALL {
        let (mine, sweep) = category.flags();
        conn.execute(
            "INSERT INTO hdchain (hdroot_id, chaincode, mine, sweep, mindepth, maxdepth) \
             VALUES (?1, 0, ?2, ?3, 0, 0)",
            params![id, mine, sweep],
        )?;
    }

    let root = HdRoot { id, bytes: raw };
    raw.zeroize();
    Ok(root)
}

/// Reads a chain's current `maxdepth`, derives the secret at that depth,
/// inserts it (merging per §3's monotone rules if it already exists),
/// links it via an `HDKey` row, and increments `maxdepth` — all within one
/// transaction.
pub fn reserve_secret(
    conn: &Connection,
    root: &HdRoot,
    timestamp: i64,
    category: Category,
) -> Result<WalletSecret> {
    let (mine, sweep) = category.flags();
    let tx = conn.unchecked_transaction()?;

    let (hdchain_id, depth): (i64, i64) = tx.query_row(
        "SELECT id, maxdepth FROM hdchain WHERE hdroot_id = ?1 AND chaincode = 0 AND mine = ?2 AND sweep = ?3",
        params![root.id(), mine, sweep],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let secret_digest = root.derive(category, depth as u64);
    let secret_hex = secret_digest.to_hex();

    let existing: Option<(i64, bool, bool)> = tx
        .query_row(
            "SELECT id, mine, sweep FROM secret WHERE secret = ?1",
            params![secret_hex],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let secret_id = match existing {
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

    tx.execute(
        "INSERT INTO hdkey (hdchain_id, depth, secret_id) VALUES (?1, ?2, ?3)",
        params![hdchain_id, depth, secret_id],
    )?;
    tx.execute("UPDATE hdchain SET maxdepth = maxdepth + 1 WHERE id = ?1", params![hdchain_id])?;

    tx.commit()?;

    Ok(WalletSecret { id: secret_id, secret_hex })
}
