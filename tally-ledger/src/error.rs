//! Error types for the ledger

use crate::types::RequestStatus;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// No wallet exists for the user
    #[error("wallet not found for user {0}")]
    WalletNotFound(String),

    /// Wallet creation attempted for a user that already has one
    #[error("wallet already exists for user {0}")]
    WalletExists(String),

    /// No money request with the given id
    #[error("money request not found: {0}")]
    RequestNotFound(Uuid),

    /// A debit would drive the balance negative
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Balance at the time of the check
        balance: Decimal,
        /// Amount the caller tried to take
        requested: Decimal,
    },

    /// Operation rejected before touching any balance (self-transfer,
    /// non-positive amount, wrong caller, currency mismatch)
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Money-request transition attempted out of a terminal state
    #[error("invalid state transition: request {id} is {status}")]
    InvalidStateTransition {
        /// Request the caller tried to transition
        id: Uuid,
        /// Its current (terminal) status
        status: RequestStatus,
    },

    /// The atomic scope could not commit (lock wait exhausted, store fault);
    /// nothing was applied
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// Ledger entry lookup miss
    #[error("ledger entry not found: {0}")]
    EntryNotFound(u64),

    /// Storage error (RocksDB)
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
