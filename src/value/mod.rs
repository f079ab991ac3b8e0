// SPDX-License-Identifier: CC0-1.0

//! Value types and codecs: 256-bit digests, amounts, and webcash string
//! serialisation.

mod amount;
mod digest;
mod webcash;

pub use amount::Amount;
pub use digest::Digest;
pub use webcash::{ParseWebcashError, PublicWebcash, SecretWebcash};
