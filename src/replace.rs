// SPDX-License-Identifier: CC0-1.0

//! The replace protocol: swaps a set of unspent wallet-held outputs for a
//! set of freshly-derived outputs through a remote mint server.
//!
//! This is the hardest part of the core. Everything up to and including the
//! POST is pure validation with no side effects; the commit phase below is
//! only reached once the server has already observed success, so individual
//! row-update failures there are logged and best-effort rather than fatal.

use core::fmt;

use rusqlite::Connection;
use serde::Serialize;
use url::Url;

use crate::error::WalletError;
use crate::ledger::{self, load_output_with_secret};
use crate::value::{Amount, AmountOverflowError, Digest, PublicWebcash, SecretWebcash};

/// One already-derived secret waiting to become a new output if the
/// exchange commits.
///
/// The caller derives and logs this secret (via `ReserveSecret` +
/// `AddSecretToWallet`) *before* calling [`replace`] — that ordering is
/// what keeps a crash between the server's 200 and the local commit
/// recoverable from the log (§4.F non-atomicity note).
#[derive(Debug, Clone)]
pub struct ReplaceOutput {
    /// Row id of the `secret` this output will bind to.
    pub secret_id: i64,
    /// The secret's hex preimage.
    pub secret_hex: String,
    /// The output's amount.
    pub amount: Amount,
}

/// One input-side output row successfully folded into a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// The `secret_id` the new output is bound to.
    pub secret_id: i64,
    /// Row id of the freshly-inserted output.
    pub output_id: i64,
    /// The output's amount.
    pub amount: Amount,
}

/// Successfully-inserted new outputs from a committed replace. Outputs
/// whose insert failed are logged and omitted, not retried (§4.F commit
/// phase).
pub type ReplaceResult = Vec<ReplaceOutcome>;

/// A failure that leaves the wallet's durable state exactly as it was
/// (§7 kinds 4-5): precondition violations and transport/HTTP failures.
#[derive(Debug)]
pub enum ReplaceError {
    /// No inputs were given.
    EmptyInputs,
    /// No outputs were given.
    EmptyOutputs,
    /// An input output id does not exist, or the wallet holds no secret
    /// for it.
    UnknownSecret,
    /// An input output is already marked spent.
    AlreadySpent,
    /// An input or output amount was less than 1.
    AmountTooSmall,
    /// `sum(inputs) != sum(outputs)`.
    ConservationMismatch,
    /// A database read failed while validating preconditions.
    Database(WalletError),
    /// The transport could not complete the request (connection, timeout).
    Network(String),
    /// The server responded with a non-200 status.
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, surfaced to the user.
        body: String,
    },
}

impl fmt::Display for ReplaceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EmptyInputs => write!(f, "replace requires at least one input"),
            Self::EmptyOutputs => write!(f, "replace requires at least one output"),
            Self::UnknownSecret => write!(f, "input output has no known secret"),
            Self::AlreadySpent => write!(f, "input output is already spent"),
            Self::AmountTooSmall => write!(f, "amount must be at least 1"),
            Self::ConservationMismatch => write!(f, "sum(inputs) != sum(outputs)"),
            Self::Database(e) => write!(f, "database error validating replace: {e}"),
            Self::Network(e) => write!(f, "transport error: {e}"),
            Self::Http { status, body } => write!(f, "server returned HTTP {status}: {body}"),
        }
    }
}

impl std::error::Error for ReplaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WalletError> for ReplaceError {
    fn from(e: WalletError) -> Self { ReplaceError::Database(e) }
}

impl From<AmountOverflowError> for ReplaceError {
    fn from(_: AmountOverflowError) -> Self { ReplaceError::ConservationMismatch }
}

/// A transport-level response: status code plus raw body.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

/// A transport-level failure (connection refused, timeout, DNS failure).
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}

impl std::error::Error for TransportError {}

/// Abstracts the HTTPS POST to the mint server, so the replace state
/// machine can be driven by a mock in tests (§9 Design Notes, "HTTP
/// client").
pub trait Transport: Send + Sync {
    /// Sends `body` as `content_type` to `url`, returning the response or a
    /// transport-level error. Implementations must apply the 60-second
    /// read/write timeout themselves (§4.F).
    fn post(
        &self,
        url: &Url,
        body: &[u8],
        content_type: &str,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// Production [`Transport`] backed by `bitreq`, with the spec's 60-second
/// read/write timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitreqTransport;

impl Transport for BitreqTransport {
    fn post(
        &self,
        url: &Url,
        body: &[u8],
        content_type: &str,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let response = bitreq::post(url.as_str())
            .with_header("Content-Type", content_type)
            .with_body(body.to_vec())
            .with_timeout(60)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(TransportResponse {
            status: response.status_code as u16,
            body: response.into_bytes(),
        })
    }
}

#[derive(Serialize)]
struct Legalese {
    terms: bool,
}

#[derive(Serialize)]
struct WireRequest {
    webcashes: Vec<String>,
    new_webcashes: Vec<String>,
    legalese: Legalese,
}

fn public_hash(secret_hex: &str) -> Digest {
    use sha2::{Digest as ShaDigest, Sha256};
    let bytes = hex_decode(secret_hex);
    let out: [u8; 32] = Sha256::digest(bytes).into();
    Digest::from_bytes(out)
}

fn hex_decode(s: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, chunk) in out.iter_mut().enumerate() {
        *chunk = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).expect("secret hex is validated at insert");
    }
    out
}

/// Runs one replace exchange: validates preconditions, builds and sends
/// the wire request, and on success commits the local state transition.
///
/// `input_output_ids` names already-existing, unspent, wallet-held output
/// rows. `outputs` names secrets the caller has already reserved and
/// logged (see [`ReplaceOutput`]).
pub fn replace(
    conn: &Connection,
    transport: &dyn Transport,
    server: &Url,
    timestamp: i64,
    input_output_ids: &[i64],
    outputs: &[ReplaceOutput],
) -> std::result::Result<ReplaceResult, ReplaceError> {
    if input_output_ids.is_empty() {
        return Err(ReplaceError::EmptyInputs);
    }
    if outputs.is_empty() {
        return Err(ReplaceError::EmptyOutputs);
    }

    let mut inputs = Vec::with_capacity(input_output_ids.len());
    for &id in input_output_ids {
        let (output, secret_hex) = load_output_with_secret(conn, id)?.ok_or(ReplaceError::UnknownSecret)?;
        let secret_hex = secret_hex.ok_or(ReplaceError::UnknownSecret)?;
        if output.spent {
            return Err(ReplaceError::AlreadySpent);
        }
        if output.amount.as_i64() < 1 {
            return Err(ReplaceError::AmountTooSmall);
        }
        inputs.push((output.id, secret_hex, output.amount));
    }
    for o in outputs {
        if o.amount.as_i64() < 1 {
            return Err(ReplaceError::AmountTooSmall);
        }
    }

    let input_total = Amount::checked_sum(inputs.iter().map(|(_, _, a)| *a))?;
    let output_total = Amount::checked_sum(outputs.iter().map(|o| o.amount))?;
    if input_total != output_total {
        return Err(ReplaceError::ConservationMismatch);
    }

    let webcashes: Vec<String> = inputs
        .iter()
        .map(|(_, hex, amount)| {
            SecretWebcash::new(*amount, Digest::from_hex(hex).expect("secret hex is validated at insert"))
                .to_string()
        })
        .collect();
    let new_webcashes: Vec<String> = outputs
        .iter()
        .map(|o| {
            SecretWebcash::new(
                o.amount,
                Digest::from_hex(&o.secret_hex).expect("secret hex is validated at insert"),
            )
            .to_string()
        })
        .collect();

    let request = WireRequest { webcashes, new_webcashes, legalese: Legalese { terms: true } };
    let body = serde_json::to_vec(&request).expect("WireRequest always serialises");

    let url = server.join("/api/v1/replace").expect("server url joins a static relative path");
    let response = transport.post(&url, &body, "application/json").map_err(|e| ReplaceError::Network(e.0))?;

    if response.status != 200 {
        let body_text = String::from_utf8_lossy(&response.body).into_owned();
        return Err(ReplaceError::Http { status: response.status, body: body_text });
    }

    // Commit phase: the server has already observed success. Each row
    // change is its own statement; a failure here is logged and does not
    // roll back the rest, per §4.F.
    for (output_id, _, _) in &inputs {
        if let Err(e) = ledger::mark_output_spent(conn, *output_id) {
            log::error!(
                target: "webcash_wallet::replace",
                "failed to mark input output {output_id} spent after server commit: {e}",
            );
        }
    }

    let mut outcomes = Vec::with_capacity(outputs.len());
    for o in outputs {
        let pk = PublicWebcash::new(o.amount, public_hash(&o.secret_hex));
        match ledger::add_output_to_wallet(conn, timestamp, &pk, Some(o.secret_id), false) {
            Ok(output_id) => outcomes.push(ReplaceOutcome { secret_id: o.secret_id, output_id, amount: o.amount }),
            Err(e) => log::error!(
                target: "webcash_wallet::replace",
                "failed to insert committed output for secret {}: {e}",
                o.secret_id,
            ),
        }
    }
    Ok(outcomes)
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use crate::ledger::add_output_to_wallet;
    use crate::recovery::mock::InMemoryRecoveryLog;
    use crate::store;
    use crate::value::Digest;

    fn fresh_conn() -> Connection {
        let _ = env_logger::try_init();
        let conn = Connection::open_in_memory().unwrap();
        store::create_schema(&conn).unwrap();
        conn
    }

    fn server() -> Url { Url::parse("https://mint.example").unwrap() }

    fn reserve_and_insert_input(conn: &Connection, amount: i64, tag: u8) -> i64 {
        let mut log = InMemoryRecoveryLog::default();
        let secret = Digest::from_bytes([tag; 32]);
        let sk = SecretWebcash::new(Amount::from_i64(amount), secret);
        let secret_id = ledger::add_secret_to_wallet(conn, &mut log, 1, &sk, true, false).unwrap();
        let public_hash = public_hash(&secret.to_hex());
        let pk = PublicWebcash::new(Amount::from_i64(amount), public_hash);
        add_output_to_wallet(conn, 1, &pk, Some(secret_id), false).unwrap()
    }

    fn reserve_output(conn: &Connection, amount: i64, tag: u8) -> ReplaceOutput {
        let mut log = InMemoryRecoveryLog::default();
        let secret = Digest::from_bytes([tag; 32]);
        let sk = SecretWebcash::new(Amount::from_i64(amount), secret);
        let secret_id = ledger::add_secret_to_wallet(conn, &mut log, 1, &sk, true, false).unwrap();
        ReplaceOutput { secret_id, secret_hex: secret.to_hex(), amount: Amount::from_i64(amount) }
    }

    #[test]
    fn conservation_mismatch_sends_no_request() {
        let conn = fresh_conn();
        let input_id = reserve_and_insert_input(&conn, 10, 1);
        let transport = MockTransport::respond(Err(TransportError("should not be called".into())));
        let outputs = vec![reserve_output(&conn, 9, 2)];

        let err = replace(&conn, &transport, &server(), 2, &[input_id], &outputs).unwrap_err();
        assert!(matches!(err, ReplaceError::ConservationMismatch));

        let spent: bool =
            conn.query_row("SELECT spent FROM output WHERE id = ?1", [input_id], |r| r.get(0)).unwrap();
        assert!(!spent);
    }

    #[test]
    fn network_failure_leaves_input_unspent() {
        let conn = fresh_conn();
        let input_id = reserve_and_insert_input(&conn, 10, 1);
        let transport = MockTransport::respond(Err(TransportError("connection refused".into())));
        let outputs = vec![reserve_output(&conn, 10, 2)];

        let err = replace(&conn, &transport, &server(), 2, &[input_id], &outputs).unwrap_err();
        assert!(matches!(err, ReplaceError::Network(_)));

        let spent: bool =
            conn.query_row("SELECT spent FROM output WHERE id = ?1", [input_id], |r| r.get(0)).unwrap();
        assert!(!spent);
        let output_count: i64 = conn.query_row("SELECT COUNT(*) FROM output", [], |r| r.get(0)).unwrap();
        assert_eq!(output_count, 1);
    }

    #[test]
    fn http_error_leaves_input_unspent() {
        let conn = fresh_conn();
        let input_id = reserve_and_insert_input(&conn, 10, 1);
        let transport =
            MockTransport::respond(Ok(TransportResponse { status: 500, body: b"server error".to_vec() }));
        let outputs = vec![reserve_output(&conn, 10, 2)];

        let err = replace(&conn, &transport, &server(), 2, &[input_id], &outputs).unwrap_err();
        assert!(matches!(err, ReplaceError::Http { status: 500, .. }));

        let spent: bool =
            conn.query_row("SELECT spent FROM output WHERE id = ?1", [input_id], |r| r.get(0)).unwrap();
        assert!(!spent);
    }

    #[test]
    fn success_marks_input_spent_and_inserts_output() {
        let conn = fresh_conn();
        let input_id = reserve_and_insert_input(&conn, 10, 1);
        let transport = MockTransport::respond(Ok(TransportResponse { status: 200, body: b"{}".to_vec() }));
        let outputs = vec![reserve_output(&conn, 10, 2)];

        let outcomes = replace(&conn, &transport, &server(), 2, &[input_id], &outputs).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].amount, Amount::from_i64(10));

        let spent: bool =
            conn.query_row("SELECT spent FROM output WHERE id = ?1", [input_id], |r| r.get(0)).unwrap();
        assert!(spent);
        let output_count: i64 = conn.query_row("SELECT COUNT(*) FROM output", [], |r| r.get(0)).unwrap();
        assert_eq!(output_count, 2);
    }

    #[test]
    fn empty_inputs_is_a_precondition_failure() {
        let conn = fresh_conn();
        let transport = MockTransport::respond(Err(TransportError("should not be called".into())));
        let outputs = vec![reserve_output(&conn, 10, 2)];
        let err = replace(&conn, &transport, &server(), 2, &[], &outputs).unwrap_err();
        assert!(matches!(err, ReplaceError::EmptyInputs));
    }
}
