//! Main ledger orchestration layer
//!
//! This module ties together storage, the wallet store, the transfer
//! engine, and the request workflow into a high-level API for wallet
//! operations.
//!
//! # Example
//!
//! ```no_run
//! use tally_ledger::{Config, Ledger, UserId};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> tally_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let alice = UserId::new("alice");
//!     let bob = UserId::new("bob");
//!     ledger.create_wallet(&alice).await?;
//!     ledger.create_wallet(&bob).await?;
//!
//!     ledger.deposit(&alice, Decimal::from(1000), None).await?;
//!     ledger.transfer(&alice, &bob, Decimal::from(300), Some("rent".into())).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    config::Config,
    error::Result,
    history::{EntryFilter, TransactionLog},
    metrics::Metrics,
    notify::{ChannelSink, NotificationSink},
    requests::RequestWorkflow,
    storage::Storage,
    transfer::TransferEngine,
    types::{LedgerEntry, MoneyRequest, UserId, Wallet},
    wallet::WalletStore,
    Error,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::Duration;
use uuid::Uuid;

/// Main ledger interface
pub struct Ledger {
    wallets: Arc<WalletStore>,
    engine: Arc<TransferEngine>,
    log: TransactionLog,
    requests: RequestWorkflow,
    metrics: Metrics,
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration and the default channel-backed
    /// notification sink.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(config: Config) -> Result<Self> {
        let sink = ChannelSink::spawn(config.notification_buffer);
        Self::open_with_sink(config, sink).await
    }

    /// Open ledger with an injected notification sink
    pub async fn open_with_sink(
        config: Config,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics =
            Metrics::new().map_err(|e| Error::Config(format!("metrics init failed: {e}")))?;
        let lock_wait = Duration::from_millis(config.lock_wait_ms);

        let wallets = Arc::new(WalletStore::new(
            storage.clone(),
            lock_wait,
            config.default_currency,
        ));
        let engine = Arc::new(TransferEngine::new(
            wallets.clone(),
            storage.clone(),
            sink.clone(),
            metrics.clone(),
            config.low_balance_threshold,
        ));
        let log = TransactionLog::new(storage.clone());
        let requests = RequestWorkflow::new(
            storage,
            engine.clone(),
            sink,
            metrics.clone(),
            lock_wait,
        );

        Ok(Self {
            wallets,
            engine,
            log,
            requests,
            metrics,
            config,
        })
    }

    // Wallet operations

    /// Create a wallet with balance zero; fails if the user already has one
    pub async fn create_wallet(&self, user: &UserId) -> Result<Wallet> {
        self.wallets.create_wallet(user).await
    }

    /// Create the wallet if missing, otherwise return the existing one
    pub async fn ensure_wallet(&self, user: &UserId) -> Result<Wallet> {
        self.wallets.ensure_wallet(user).await
    }

    /// Fetch a wallet row
    pub fn wallet(&self, user: &UserId) -> Result<Wallet> {
        self.wallets.wallet(user)
    }

    /// Current balance
    pub fn balance_of(&self, user: &UserId) -> Result<Decimal> {
        self.wallets.balance_of(user)
    }

    // Money movement

    /// Credit external capital to a wallet
    pub async fn deposit(
        &self,
        user: &UserId,
        amount: Decimal,
        memo: Option<String>,
    ) -> Result<LedgerEntry> {
        self.engine.deposit(user, amount, memo).await
    }

    /// Debit external capital from a wallet
    pub async fn withdraw(
        &self,
        user: &UserId,
        amount: Decimal,
        memo: Option<String>,
    ) -> Result<LedgerEntry> {
        self.engine.withdraw(user, amount, memo).await
    }

    /// Atomically move funds between two wallets
    pub async fn transfer(
        &self,
        payer: &UserId,
        payee: &UserId,
        amount: Decimal,
        memo: Option<String>,
    ) -> Result<LedgerEntry> {
        self.engine.transfer(payer, payee, amount, memo).await
    }

    // History

    /// Wallet history, newest first, narrowed by `filter`
    pub fn history(&self, user: &UserId, filter: &EntryFilter) -> Result<Vec<LedgerEntry>> {
        self.log.history(user, filter)
    }

    /// Fetch a single ledger entry
    pub fn entry(&self, id: u64) -> Result<LedgerEntry> {
        self.log.entry(id)
    }

    // Money requests

    /// Propose a pull-payment from `to_user`
    pub async fn request_money(
        &self,
        from_user: &UserId,
        to_user: &UserId,
        amount: Decimal,
        memo: Option<String>,
    ) -> Result<MoneyRequest> {
        self.requests.create(from_user, to_user, amount, memo).await
    }

    /// Requests addressed to `user`, newest first
    pub fn incoming_requests(&self, user: &UserId) -> Result<Vec<MoneyRequest>> {
        self.requests.incoming_requests(user)
    }

    /// Fetch one money request
    pub fn request(&self, id: Uuid) -> Result<MoneyRequest> {
        self.requests.request(id)
    }

    /// Accept a request as its target, paying the requester
    pub async fn accept_request(&self, id: Uuid, caller: &UserId) -> Result<LedgerEntry> {
        self.requests.accept(id, caller).await
    }

    /// Decline a request as its target
    pub async fn decline_request(&self, id: Uuid, caller: &UserId) -> Result<MoneyRequest> {
        self.requests.decline(id, caller).await
    }

    /// Cancel a request as its requester
    pub async fn cancel_request(&self, id: Uuid, caller: &UserId) -> Result<MoneyRequest> {
        self.requests.cancel(id, caller).await
    }

    // Introspection

    /// Metrics collector for this ledger instance
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryKind, EntryStatus, RequestStatus};
    use tempfile::TempDir;

    async fn test_ledger() -> (Ledger, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        (Ledger::open(config).await.unwrap(), temp)
    }

    #[tokio::test]
    async fn test_deposit_then_transfer_scenario() {
        let (ledger, _temp) = test_ledger().await;
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        ledger.create_wallet(&alice).await.unwrap();
        ledger.create_wallet(&bob).await.unwrap();

        ledger.deposit(&alice, Decimal::from(1000), None).await.unwrap();
        assert_eq!(ledger.balance_of(&alice).unwrap(), Decimal::from(1000));

        ledger
            .transfer(&alice, &bob, Decimal::from(300), Some("rent".to_string()))
            .await
            .unwrap();
        assert_eq!(ledger.balance_of(&alice).unwrap(), Decimal::from(700));
        assert_eq!(ledger.balance_of(&bob).unwrap(), Decimal::from(300));

        let history = ledger.history(&alice, &EntryFilter::default()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, EntryKind::Transfer);
        assert_eq!(history[0].amount, Decimal::from(300));
        assert_eq!(history[1].kind, EntryKind::Deposit);
    }

    #[tokio::test]
    async fn test_request_accept_end_to_end() {
        let (ledger, _temp) = test_ledger().await;
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");
        ledger.create_wallet(&u1).await.unwrap();
        ledger.create_wallet(&u2).await.unwrap();
        ledger.deposit(&u2, Decimal::from(500), None).await.unwrap();

        let request = ledger
            .request_money(&u1, &u2, Decimal::from(200), None)
            .await
            .unwrap();
        assert_eq!(ledger.incoming_requests(&u2).unwrap().len(), 1);

        ledger.accept_request(request.id, &u2).await.unwrap();
        assert_eq!(ledger.balance_of(&u2).unwrap(), Decimal::from(300));
        assert_eq!(ledger.balance_of(&u1).unwrap(), Decimal::from(200));
        assert_eq!(
            ledger.request(request.id).unwrap().status,
            RequestStatus::Accepted
        );
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();

        let alice = UserId::new("alice");
        {
            let ledger = Ledger::open(config.clone()).await.unwrap();
            ledger.create_wallet(&alice).await.unwrap();
            ledger.deposit(&alice, Decimal::from(750), None).await.unwrap();
        }

        let ledger = Ledger::open(config).await.unwrap();
        assert_eq!(ledger.balance_of(&alice).unwrap(), Decimal::from(750));

        let history = ledger.history(&alice, &EntryFilter::default()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, EntryStatus::Success);

        // Fresh entries keep the sequence moving
        let entry = ledger.deposit(&alice, Decimal::from(1), None).await.unwrap();
        assert_eq!(entry.id, 2);
    }

    #[tokio::test]
    async fn test_metrics_track_operations() {
        let (ledger, _temp) = test_ledger().await;
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        ledger.create_wallet(&alice).await.unwrap();
        ledger.create_wallet(&bob).await.unwrap();

        ledger.deposit(&alice, Decimal::from(100), None).await.unwrap();
        ledger.transfer(&alice, &bob, Decimal::from(40), None).await.unwrap();
        let _ = ledger.transfer(&alice, &bob, Decimal::from(9999), None).await;

        assert_eq!(ledger.metrics().deposits_total.get(), 1);
        assert_eq!(ledger.metrics().transfers_total.get(), 1);
        assert_eq!(ledger.metrics().transfers_failed_total.get(), 1);
    }
}
