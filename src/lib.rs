// SPDX-License-Identifier: CC0-1.0

//! # Webcash wallet core
//!
//! Persistent, process-local wallet core for a webcash client. Owns an
//! HD master secret, derives per-purpose secrets deterministically, tracks
//! the spent/unspent state of webcash outputs, and drives the "replace"
//! exchange protocol against a remote mint server.
//!
//! The command-line front end, the HTTPS transport's TLS stack, and any
//! mining/proof-of-work logic are external collaborators; this crate
//! consumes them through narrow seams ([`Transport`](replace::Transport),
//! [`WalletConfig`](config::WalletConfig)) rather than owning them.

mod config;
mod error;
mod hdkey;
mod ledger;
mod recovery;
mod replace;
mod sql;
mod store;
mod terms;
mod value;
mod wallet;

pub use config::WalletConfig;
pub use error::{Result, WalletError};
pub use hdkey::{Category, WalletSecret};
pub use ledger::{Balance, CategoryBalance, WalletOutput};
pub use replace::{
    BitreqTransport, ReplaceError, ReplaceOutcome, ReplaceOutput, ReplaceResult, Transport,
    TransportError, TransportResponse,
};
pub use value::{Amount, Digest, ParseWebcashError, PublicWebcash, SecretWebcash};
pub use wallet::Wallet;
