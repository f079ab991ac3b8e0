// SPDX-License-Identifier: CC0-1.0

use core::fmt;

/// Crate-specific Result type.
pub type Result<T> = std::result::Result<T, WalletError>;

/// Environmental-fatal and mutation-failure errors (§7 kinds 1, 3, 6).
///
/// Precondition violations and transport failures on `replace` are *not*
/// part of this type; they return [`crate::ReplaceError`] instead, since
/// callers need to branch on "nothing happened" vs. "the wallet is
/// unusable" without downcasting.
#[derive(Debug)]
pub enum WalletError {
    /// Wrapper of an `io::Error`, e.g. recovery log creation failure.
    Io(std::io::Error),
    /// Wrapper of a `rusqlite::Error`.
    Sql(rusqlite::Error),
    /// The wallet database is already locked by another process.
    WalletInUse,
    /// More than one row exists in the `hdroot` table.
    MultipleHdRoots,
    /// The `hdroot` row has an unsupported `version` value.
    UnsupportedRootVersion(i64),
    /// The `hdroot` row's `secret` column is outside the 16-32 byte range.
    InvalidRootLength(usize),
    /// A read path expected exactly one row and got none or more than one.
    UnexpectedRowCount,
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::Sql(e) => write!(f, "sql error: {e}"),
            Self::WalletInUse => write!(f, "wallet is in use"),
            Self::MultipleHdRoots => write!(f, "more than one hdroot row found, wallet is corrupt"),
            Self::UnsupportedRootVersion(v) => write!(f, "hdroot version {v} is not supported"),
            Self::InvalidRootLength(n) => write!(f, "hdroot secret length {n} is out of range 16-32"),
            Self::UnexpectedRowCount => write!(f, "expected exactly one row, query returned a different count"),
        }
    }
}

impl std::error::Error for WalletError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Sql(e) => Some(e),
            Self::WalletInUse
            | Self::MultipleHdRoots
            | Self::UnsupportedRootVersion(_)
            | Self::InvalidRootLength(_)
            | Self::UnexpectedRowCount => None,
        }
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self { WalletError::Io(e) }
}

impl From<rusqlite::Error> for WalletError {
    fn from(e: rusqlite::Error) -> Self { WalletError::Sql(e) }
}
