// SPDX-License-Identifier: CC0-1.0

use core::fmt;

/// A webcash amount, in signed 64-bit minor units.
///
/// Addition never saturates: summing a set of amounts that would overflow
/// is an error the caller must handle, not a silently clamped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

/// Returned by [`Amount::checked_sum`] when a running total would overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountOverflowError;

impl fmt::Display for AmountOverflowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sum of amounts overflowed i64")
    }
}

impl std::error::Error for AmountOverflowError {}

impl Amount {
    /// Builds an amount from raw minor units.
    pub const fn from_i64(v: i64) -> Self { Amount(v) }

    /// Returns the raw minor-unit value.
    pub const fn as_i64(self) -> i64 { self.0 }

    /// Sums an iterator of amounts, refusing to overflow.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(
        amounts: I,
    ) -> Result<Amount, AmountOverflowError> {
        let mut total: i64 = 0;
        for a in amounts {
            total = total.checked_add(a.0).ok_or(AmountOverflowError)?;
        }
        Ok(Amount(total))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}

impl From<i64> for Amount {
    fn from(v: i64) -> Self { Amount(v) }
}
