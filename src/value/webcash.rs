// SPDX-License-Identifier: CC0-1.0

use core::fmt;

use super::digest::ParseDigestError;
use super::{Amount, Digest};

/// Error returned when parsing a webcash string fails.
///
/// Parsing is the exact inverse of serialisation: any deviation in case,
/// length, or the `secret`/`public` tag fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseWebcashError {
    /// The string did not start with `e`.
    MissingAmountPrefix,
    /// The amount portion was not a valid integer.
    InvalidAmount,
    /// The middle field was neither `secret` nor `public` (for the type
    /// being parsed, the other of the two).
    WrongKind,
    /// The string did not have exactly three `:`-separated fields.
    WrongFieldCount,
    /// The hex digest field failed to parse.
    Digest(ParseDigestError),
}

impl fmt::Display for ParseWebcashError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingAmountPrefix => write!(f, "webcash string must start with 'e'"),
            Self::InvalidAmount => write!(f, "webcash amount is not a valid integer"),
            Self::WrongKind => write!(f, "webcash string has the wrong secret/public tag"),
            Self::WrongFieldCount => write!(f, "webcash string must have exactly 3 ':'-separated fields"),
            Self::Digest(e) => write!(f, "webcash digest field: {e}"),
        }
    }
}

impl std::error::Error for ParseWebcashError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Digest(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseDigestError> for ParseWebcashError {
    fn from(e: ParseDigestError) -> Self { ParseWebcashError::Digest(e) }
}

fn split_fields(s: &str) -> Result<(Amount, &str, &str), ParseWebcashError> {
    let mut parts = s.splitn(3, ':');
    let amount_field = parts.next().ok_or(ParseWebcashError::WrongFieldCount)?;
    let kind = parts.next().ok_or(ParseWebcashError::WrongFieldCount)?;
    let hex = parts.next().ok_or(ParseWebcashError::WrongFieldCount)?;
    if parts.next().is_some() {
        return Err(ParseWebcashError::WrongFieldCount);
    }
    let amount_str = amount_field.strip_prefix('e').ok_or(ParseWebcashError::MissingAmountPrefix)?;
    let amount: i64 = amount_str.parse().map_err(|_| ParseWebcashError::InvalidAmount)?;
    Ok((Amount::from_i64(amount), kind, hex))
}

/// A secret webcash: `eAMOUNT:secret:HEX`, amount plus 32-byte secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretWebcash {
    amount: Amount,
    secret: Digest,
}

impl SecretWebcash {
    /// Builds a secret webcash from an amount and the raw secret digest.
    pub fn new(amount: Amount, secret: Digest) -> Self { SecretWebcash { amount, secret } }

    /// The amount carried by this webcash.
    pub fn amount(&self) -> Amount { self.amount }

    /// The 32-byte secret preimage.
    pub fn secret(&self) -> &Digest { &self.secret }
}

impl fmt::Display for SecretWebcash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "e{}:secret:{}", self.amount, self.secret)
    }
}

impl std::str::FromStr for SecretWebcash {
    type Err = ParseWebcashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, kind, hex) = split_fields(s)?;
        if kind != "secret" {
            return Err(ParseWebcashError::WrongKind);
        }
        Ok(SecretWebcash { amount, secret: Digest::from_hex(hex)? })
    }
}

/// A public webcash: `eAMOUNT:public:HEX`, amount plus the SHA-256 hash of
/// a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicWebcash {
    amount: Amount,
    hash: Digest,
}

impl PublicWebcash {
    /// Builds a public webcash from an amount and the public hash.
    pub fn new(amount: Amount, hash: Digest) -> Self { PublicWebcash { amount, hash } }

    /// The amount carried by this webcash.
    pub fn amount(&self) -> Amount { self.amount }

    /// The 32-byte public hash.
    pub fn hash(&self) -> &Digest { &self.hash }
}

impl fmt::Display for PublicWebcash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "e{}:public:{}", self.amount, self.hash)
    }
}

impl std::str::FromStr for PublicWebcash {
    type Err = ParseWebcashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, kind, hex) = split_fields(s)?;
        if kind != "public" {
            return Err(ParseWebcashError::WrongKind);
        }
        Ok(PublicWebcash { amount, hash: Digest::from_hex(hex)? })
    }
}
