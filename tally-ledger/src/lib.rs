//! Tally Ledger Core
//!
//! Wallet balances, an append-only transaction log, and the money-request
//! workflow for the Tally payments service.
//!
//! # Architecture
//!
//! - **Single store**: one RocksDB handle injected into every component
//! - **Per-row locking**: each wallet mutates only under its own async
//!   mutex, with a fixed global lock order for two-wallet moves
//! - **Atomic commits**: balance rows and their log entry become durable
//!   in one write batch
//! - **Best-effort events**: notifications are dispatched off the critical
//!   path and can fail without affecting the ledger
//!
//! # Invariants
//!
//! - Transfers are zero-sum: the balance total changes only via
//!   deposit/withdraw
//! - No wallet balance is ever negative
//! - Entries are append-only: never modified or deleted
//! - A money request is ACCEPTED only if its transfer committed

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod history;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod requests;
pub mod storage;
pub mod transfer;
pub mod types;
pub mod wallet;

// Re-exports
pub use config::{Config, RocksDbConfig};
pub use error::{Error, Result};
pub use history::{EntryFilter, TransactionLog};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use notify::{Category, ChannelSink, MemorySink, Notification, NotificationSink};
pub use requests::RequestWorkflow;
pub use storage::Storage;
pub use transfer::TransferEngine;
pub use types::{
    Currency, EntryKind, EntryStatus, LedgerEntry, MoneyRequest, RequestStatus, UserId, Wallet,
};
pub use wallet::WalletStore;
