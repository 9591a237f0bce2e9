//! Transfer engine: the one unit that moves money
//!
//! Direct sends, deposits, withdrawals, and accepted money requests all
//! funnel through here. The engine validates, applies the balance change
//! through the wallet store's atomic primitives, and appends the ledger
//! entry in the same commit. Notifications go out after the commit and
//! never affect its outcome.

use crate::{
    error::{Error, Result},
    metrics::Metrics,
    notify::{Category, Notification, NotificationSink},
    storage::Storage,
    types::{EntryKind, EntryStatus, LedgerEntry, UserId},
    wallet::WalletStore,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Orchestrates atomic balance moves with durable logging
pub struct TransferEngine {
    wallets: Arc<WalletStore>,
    storage: Arc<Storage>,
    sink: Arc<dyn NotificationSink>,
    metrics: Metrics,

    /// Payers ending below this get a low-balance notification
    low_balance_threshold: Decimal,
}

impl TransferEngine {
    /// Create an engine over the shared stores
    pub fn new(
        wallets: Arc<WalletStore>,
        storage: Arc<Storage>,
        sink: Arc<dyn NotificationSink>,
        metrics: Metrics,
        low_balance_threshold: Decimal,
    ) -> Self {
        Self {
            wallets,
            storage,
            sink,
            metrics,
            low_balance_threshold,
        }
    }

    /// Move `amount` from `payer` to `payee` as one atomic unit.
    ///
    /// On success both balance writes and the SUCCESS entry are committed
    /// together and the entry is returned. On any failure nothing is logged
    /// as SUCCESS; an insufficient-funds attempt additionally leaves a
    /// FAILED entry as telemetry.
    pub async fn transfer(
        &self,
        payer: &UserId,
        payee: &UserId,
        amount: Decimal,
        memo: Option<String>,
    ) -> Result<LedgerEntry> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidOperation(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }
        if payer == payee {
            return Err(Error::InvalidOperation(format!(
                "self-transfer is not allowed: {payer}"
            )));
        }

        let start = Instant::now();
        let entry = LedgerEntry {
            id: self.storage.next_entry_id(),
            from: Some(payer.clone()),
            to: Some(payee.clone()),
            amount,
            kind: EntryKind::Transfer,
            status: EntryStatus::Success,
            memo,
            created_at: Utc::now(),
        };

        match self.wallets.transfer_apply(payer, payee, &entry).await {
            Ok((payer_wallet, _payee_wallet)) => {
                self.metrics.transfers_total.inc();
                self.metrics.entries_total.inc();
                self.metrics
                    .transfer_duration
                    .observe(start.elapsed().as_secs_f64());

                tracing::info!(
                    entry_id = entry.id,
                    payer = %payer,
                    payee = %payee,
                    amount = %amount,
                    "transfer committed"
                );

                self.sink.notify(Notification {
                    user: payer.clone(),
                    category: Category::TransferSent,
                    payload: json!({
                        "amount": amount,
                        "counterparty": payee.as_str(),
                        "memo": entry.memo,
                    }),
                });
                self.sink.notify(Notification {
                    user: payee.clone(),
                    category: Category::TransferReceived,
                    payload: json!({
                        "amount": amount,
                        "counterparty": payer.as_str(),
                        "memo": entry.memo,
                    }),
                });

                if payer_wallet.balance < self.low_balance_threshold {
                    self.sink.notify(Notification {
                        user: payer.clone(),
                        category: Category::LowBalance,
                        payload: json!({ "balance": payer_wallet.balance }),
                    });
                }

                Ok(entry)
            }
            Err(err) => {
                self.metrics.transfers_failed_total.inc();
                tracing::warn!(
                    payer = %payer,
                    payee = %payee,
                    amount = %amount,
                    error = %err,
                    "transfer rejected"
                );

                if matches!(err, Error::InsufficientFunds { .. }) {
                    self.record_failed_attempt(&entry);
                }

                Err(err)
            }
        }
    }

    /// Credit `amount` of external capital to `user`
    pub async fn deposit(
        &self,
        user: &UserId,
        amount: Decimal,
        memo: Option<String>,
    ) -> Result<LedgerEntry> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidOperation(format!(
                "deposit amount must be positive, got {amount}"
            )));
        }

        let entry = LedgerEntry {
            id: self.storage.next_entry_id(),
            from: None,
            to: Some(user.clone()),
            amount,
            kind: EntryKind::Deposit,
            status: EntryStatus::Success,
            memo,
            created_at: Utc::now(),
        };

        let wallet = self.wallets.adjust_balance(user, amount, &entry).await?;
        self.metrics.deposits_total.inc();
        self.metrics.entries_total.inc();

        tracing::info!(entry_id = entry.id, user = %user, amount = %amount, balance = %wallet.balance, "deposit committed");
        Ok(entry)
    }

    /// Debit `amount` of external capital from `user`, subject to the
    /// non-negative balance rule
    pub async fn withdraw(
        &self,
        user: &UserId,
        amount: Decimal,
        memo: Option<String>,
    ) -> Result<LedgerEntry> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidOperation(format!(
                "withdrawal amount must be positive, got {amount}"
            )));
        }

        let entry = LedgerEntry {
            id: self.storage.next_entry_id(),
            from: Some(user.clone()),
            to: None,
            amount,
            kind: EntryKind::Withdraw,
            status: EntryStatus::Success,
            memo,
            created_at: Utc::now(),
        };

        let wallet = self.wallets.adjust_balance(user, -amount, &entry).await?;
        self.metrics.withdrawals_total.inc();
        self.metrics.entries_total.inc();

        tracing::info!(entry_id = entry.id, user = %user, amount = %amount, balance = %wallet.balance, "withdrawal committed");
        Ok(entry)
    }

    /// Best-effort FAILED telemetry row; must never mask the typed error.
    fn record_failed_attempt(&self, entry: &LedgerEntry) {
        let failed = LedgerEntry {
            id: self.storage.next_entry_id(),
            status: EntryStatus::Failed,
            created_at: Utc::now(),
            ..entry.clone()
        };

        match self.storage.append_entry(&failed) {
            Ok(()) => self.metrics.entries_total.inc(),
            Err(e) => tracing::warn!("could not record failed attempt: {e}"),
        }
    }
}
