// SPDX-License-Identifier: CC0-1.0

//! The `Wallet` facade: the sole public entry point, serialising every
//! operation through one process-wide mutex (§5).

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::WalletConfig;
use crate::error::{Result, WalletError};
use crate::hdkey::{self, Category, WalletSecret};
use crate::ledger::{self, Balance, CategoryBalance, WalletOutput};
use crate::replace::{self, BitreqTransport, ReplaceError, ReplaceOutput, ReplaceResult, Transport};
use crate::store::Store;
use crate::terms;
use crate::value::{PublicWebcash, SecretWebcash};

fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock is after the epoch").as_secs() as i64
}

struct WalletInner {
    store: Store,
    config: WalletConfig,
    transport: Box<dyn Transport>,
}

/// The persistent wallet core.
///
/// Every public method acquires the single internal mutex for its
/// duration; there is no finer-grained locking (§5). A poisoned mutex
/// (a prior panic mid-operation) is treated as fatal, matching the
/// teacher's preference to `expect` only at truly unrecoverable
/// boundaries.
pub struct Wallet {
    inner: Mutex<WalletInner>,
}

impl Wallet {
    /// Opens (or creates) the wallet at `config.base_path`, using the
    /// production `bitreq`-backed transport.
    pub fn open(config: WalletConfig) -> Result<Wallet> {
        Wallet::open_with_transport(config, Box::new(BitreqTransport))
    }

    /// Opens the wallet with a caller-supplied [`Transport`], e.g. a mock
    /// in tests.
    pub fn open_with_transport(config: WalletConfig, transport: Box<dyn Transport>) -> Result<Wallet> {
        let store = Store::open(&config.base_path, now())?;
        Ok(Wallet { inner: Mutex::new(WalletInner { store, config, transport }) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WalletInner> {
        self.inner.lock().expect("wallet mutex poisoned by a prior panic")
    }

    /// Derives the next secret on `category`'s chain and links it via a
    /// fresh `HDKey` row.
    ///
    /// The caller is responsible for appending it to the recovery log
    /// (via [`Wallet::add_secret_to_wallet`]) before any externally
    /// observable use (§4.D).
    pub fn reserve_secret(&self, category: Category) -> Result<WalletSecret> {
        let inner = self.lock();
        hdkey::reserve_secret(&inner.store.conn, &inner.store.root, now(), category)
    }

    /// Derives and reserves the next change secret, using
    /// `config.change_category` (§9 open question 3).
    pub fn reserve_change_secret(&self) -> Result<WalletSecret> {
        let inner = self.lock();
        let category = inner.config.change_category;
        hdkey::reserve_secret(&inner.store.conn, &inner.store.root, now(), category)
    }

    /// Appends `sk` to the recovery log and inserts (or merges) its
    /// secret row (§4.E).
    pub fn add_secret_to_wallet(&self, sk: &SecretWebcash, mine: bool, sweep: bool) -> Result<i64> {
        let mut inner = self.lock();
        let timestamp = now();
        let WalletInner { store, .. } = &mut *inner;
        ledger::add_secret_to_wallet(&store.conn, store.recovery_log.as_mut(), timestamp, sk, mine, sweep)
    }

    /// Inserts one output row (§4.E).
    pub fn add_output_to_wallet(
        &self,
        pk: &PublicWebcash,
        secret_id: Option<i64>,
        spent: bool,
    ) -> Result<i64> {
        let inner = self.lock();
        ledger::add_output_to_wallet(&inner.store.conn, now(), pk, secret_id, spent)
    }

    /// Sets `spent = true` on an output row.
    pub fn mark_output_spent(&self, output_id: i64) -> Result<()> {
        let inner = self.lock();
        ledger::mark_output_spent(&inner.store.conn, output_id)
    }

    /// Loads one output row and the hex secret backing it, if held.
    pub fn load_output(&self, output_id: i64) -> Result<Option<(WalletOutput, Option<String>)>> {
        let inner = self.lock();
        ledger::load_output_with_secret(&inner.store.conn, output_id)
    }

    /// The aggregate balance across all tracked outputs.
    pub fn balance(&self) -> Result<Balance> {
        let inner = self.lock();
        ledger::balance(&inner.store.conn)
    }

    /// Balances grouped by derivation category.
    pub fn category_balances(&self) -> Result<Vec<CategoryBalance>> {
        let inner = self.lock();
        ledger::category_balances(&inner.store.conn)
    }

    /// Does the `term` table contain any row?
    pub fn have_accepted_terms(&self) -> Result<bool> {
        let inner = self.lock();
        terms::have_accepted_terms(&inner.store.conn)
    }

    /// Has this exact `body` been accepted?
    pub fn are_terms_accepted(&self, body: &str) -> Result<bool> {
        let inner = self.lock();
        terms::are_terms_accepted(&inner.store.conn, body)
    }

    /// Records `body` as accepted, idempotently.
    pub fn accept_terms(&self, body: &str) -> Result<()> {
        let inner = self.lock();
        terms::accept_terms(&inner.store.conn, now(), body)
    }

    /// Runs one replace exchange (§4.F): validates preconditions, POSTs to
    /// the configured server, and on success commits the local state
    /// transition.
    pub fn replace(
        &self,
        input_output_ids: &[i64],
        outputs: &[ReplaceOutput],
    ) -> std::result::Result<ReplaceResult, ReplaceError> {
        let inner = self.lock();
        replace::replace(
            &inner.store.conn,
            inner.transport.as_ref(),
            &inner.config.server,
            now(),
            input_output_ids,
            outputs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replace::mock::MockTransport;
    use crate::replace::TransportResponse;
    use crate::value::{Amount, Digest};

    fn config(dir: &tempfile::TempDir) -> WalletConfig {
        let _ = env_logger::try_init();
        WalletConfig::new(dir.path().join("wallet"), url::Url::parse("https://mint.example").unwrap())
    }

    #[test]
    fn open_bootstraps_fresh_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = Wallet::open_with_transport(
            config(&dir),
            Box::new(MockTransport::respond(Ok(TransportResponse { status: 200, body: vec![] }))),
        )
        .unwrap();
        let balance = wallet.balance().unwrap();
        assert_eq!(balance, Balance::default());
    }

    #[test]
    fn reserve_then_add_secret_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = Wallet::open_with_transport(
            config(&dir),
            Box::new(MockTransport::respond(Ok(TransportResponse { status: 200, body: vec![] }))),
        )
        .unwrap();

        let reserved = wallet.reserve_secret(Category::Receive).unwrap();
        let secret = Digest::from_hex(&reserved.secret_hex).unwrap();
        let sk = SecretWebcash::new(Amount::from_i64(5), secret);
        let id = wallet.add_secret_to_wallet(&sk, false, true).unwrap();
        assert_eq!(id, reserved.id);
    }

    #[test]
    fn accept_terms_is_idempotent_through_the_facade() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = Wallet::open_with_transport(
            config(&dir),
            Box::new(MockTransport::respond(Ok(TransportResponse { status: 200, body: vec![] }))),
        )
        .unwrap();
        assert!(!wallet.have_accepted_terms().unwrap());
        wallet.accept_terms("v1 terms").unwrap();
        wallet.accept_terms("v1 terms").unwrap();
        assert!(wallet.have_accepted_terms().unwrap());
    }

    #[test]
    fn second_open_on_same_path_fails_with_wallet_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let first = Wallet::open_with_transport(
            config(&dir),
            Box::new(MockTransport::respond(Ok(TransportResponse { status: 200, body: vec![] }))),
        )
        .unwrap();
        let second = Wallet::open_with_transport(
            config(&dir),
            Box::new(MockTransport::respond(Ok(TransportResponse { status: 200, body: vec![] }))),
        );
        assert!(matches!(second, Err(WalletError::WalletInUse)));
        drop(first);
    }
}
