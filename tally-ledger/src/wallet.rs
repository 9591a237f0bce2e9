//! Wallet store: one balance row per user, mutated only under that row's lock
//!
//! Every mutation follows the same protocol: take the wallet lock (bounded
//! wait), re-read the row inside the locked scope, check the funds rule,
//! then commit the new row together with its ledger entry in one atomic
//! storage batch. Two-wallet moves take both locks in ascending [`UserId`]
//! order so opposing transfers cannot deadlock.

use crate::{
    error::{Error, Result},
    storage::Storage,
    types::{Currency, LedgerEntry, UserId, Wallet},
};
use dashmap::DashMap;
use rocksdb::WriteBatch;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout, Duration};

/// Wallet store with per-wallet serializing locks
pub struct WalletStore {
    storage: Arc<Storage>,

    /// One async mutex per wallet, created on first touch
    locks: DashMap<UserId, Arc<Mutex<()>>>,

    /// Bound on lock acquisition
    lock_wait: Duration,

    /// Currency for newly created wallets
    default_currency: Currency,
}

impl WalletStore {
    /// Create a store over the shared storage handle
    pub fn new(storage: Arc<Storage>, lock_wait: Duration, default_currency: Currency) -> Self {
        Self {
            storage,
            locks: DashMap::new(),
            lock_wait,
            default_currency,
        }
    }

    async fn acquire(&self, user: &UserId) -> Result<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(user.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        timeout(self.lock_wait, lock.lock_owned())
            .await
            .map_err(|_| Error::TransferFailed(format!("timed out waiting for wallet lock: {user}")))
    }

    /// Create a wallet with balance zero.
    ///
    /// Fails with [`Error::WalletExists`] when the user already has one.
    pub async fn create_wallet(&self, user: &UserId) -> Result<Wallet> {
        let _guard = self.acquire(user).await?;

        if self.storage.get_wallet(user)?.is_some() {
            return Err(Error::WalletExists(user.to_string()));
        }

        let wallet = Wallet::new(user.clone(), self.default_currency);
        self.storage.put_wallet(&wallet)?;

        tracing::info!(user = %user, currency = %wallet.currency, "wallet created");
        Ok(wallet)
    }

    /// Create the wallet if missing, otherwise return the existing one
    pub async fn ensure_wallet(&self, user: &UserId) -> Result<Wallet> {
        let _guard = self.acquire(user).await?;

        if let Some(wallet) = self.storage.get_wallet(user)? {
            return Ok(wallet);
        }

        let wallet = Wallet::new(user.clone(), self.default_currency);
        self.storage.put_wallet(&wallet)?;

        tracing::info!(user = %user, "wallet auto-created");
        Ok(wallet)
    }

    /// Fetch a wallet row
    pub fn wallet(&self, user: &UserId) -> Result<Wallet> {
        self.storage
            .get_wallet(user)?
            .ok_or_else(|| Error::WalletNotFound(user.to_string()))
    }

    /// Current balance
    pub fn balance_of(&self, user: &UserId) -> Result<Decimal> {
        Ok(self.wallet(user)?.balance)
    }

    /// Apply `delta` (positive or negative) to one wallet and commit it with
    /// `entry` in a single atomic batch.
    ///
    /// The balance is re-read and checked inside the locked scope; a result
    /// below zero fails with [`Error::InsufficientFunds`] and nothing is
    /// written.
    pub async fn adjust_balance(
        &self,
        user: &UserId,
        delta: Decimal,
        entry: &LedgerEntry,
    ) -> Result<Wallet> {
        let _guard = self.acquire(user).await?;

        let wallet = self.wallet(user)?;
        let new_balance = wallet.balance + delta;
        if new_balance < Decimal::ZERO {
            return Err(Error::InsufficientFunds {
                balance: wallet.balance,
                requested: -delta,
            });
        }

        let updated = wallet.with_balance(new_balance);

        let mut batch = WriteBatch::default();
        self.storage.stage_wallet(&mut batch, &updated)?;
        self.storage.stage_entry(&mut batch, entry)?;
        self.storage.commit(batch)?;

        tracing::debug!(
            user = %user,
            delta = %delta,
            balance = %updated.balance,
            entry_id = entry.id,
            "balance adjusted"
        );

        Ok(updated)
    }

    /// Move `entry.amount` from `payer` to `payee` and commit both rows with
    /// `entry` in a single atomic batch.
    ///
    /// Returns the updated (payer, payee) wallets. A commit fault maps to
    /// [`Error::TransferFailed`]; no partial debit or credit can survive it.
    pub async fn transfer_apply(
        &self,
        payer: &UserId,
        payee: &UserId,
        entry: &LedgerEntry,
    ) -> Result<(Wallet, Wallet)> {
        let amount = entry.amount;

        // Fixed global lock order regardless of payer/payee role
        let (first, second) = if payer < payee {
            (payer, payee)
        } else {
            (payee, payer)
        };
        let _first_guard = self.acquire(first).await?;
        let _second_guard = self.acquire(second).await?;

        let payer_wallet = self.wallet(payer)?;
        let payee_wallet = self.wallet(payee)?;

        if payer_wallet.currency != payee_wallet.currency {
            return Err(Error::InvalidOperation(format!(
                "currency mismatch: {} pays in {}, {} holds {}",
                payer, payer_wallet.currency, payee, payee_wallet.currency
            )));
        }

        if payer_wallet.balance < amount {
            return Err(Error::InsufficientFunds {
                balance: payer_wallet.balance,
                requested: amount,
            });
        }

        let updated_payer = payer_wallet.with_balance(payer_wallet.balance - amount);
        let updated_payee = payee_wallet.with_balance(payee_wallet.balance + amount);

        let mut batch = WriteBatch::default();
        self.storage.stage_wallet(&mut batch, &updated_payer)?;
        self.storage.stage_wallet(&mut batch, &updated_payee)?;
        self.storage.stage_entry(&mut batch, entry)?;
        self.storage
            .commit(batch)
            .map_err(|e| Error::TransferFailed(format!("commit failed: {e}")))?;

        Ok((updated_payer, updated_payee))
    }
}
