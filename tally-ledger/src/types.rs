//! Core types for the payments ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Immutable history (ledger entries are never rewritten)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque user identifier, resolved by an external identity service.
///
/// Ordered so that wallet locks can be acquired in one global order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// ISO 4217 currency code. One currency per wallet, no conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// Indian Rupee
    INR,
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::INR => "INR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INR" => Some(Currency::INR),
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Per-user balance record.
///
/// Created once with balance zero; mutated only through the wallet store's
/// locked adjust/transfer operations. The balance is never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Owning user
    pub owner: UserId,

    /// Current balance (exact decimal, >= 0)
    pub balance: Decimal,

    /// Wallet currency, fixed at creation
    pub currency: Currency,

    /// Bumped on every committed mutation
    pub version: u64,

    /// Last mutation timestamp
    pub last_updated: DateTime<Utc>,
}

impl Wallet {
    /// New empty wallet for `owner`
    pub fn new(owner: UserId, currency: Currency) -> Self {
        Self {
            owner,
            balance: Decimal::ZERO,
            currency,
            version: 0,
            last_updated: Utc::now(),
        }
    }

    /// Copy with a new balance, bumped version, and fresh timestamp
    pub fn with_balance(&self, balance: Decimal) -> Self {
        Self {
            owner: self.owner.clone(),
            balance,
            currency: self.currency,
            version: self.version + 1,
            last_updated: Utc::now(),
        }
    }
}

/// Kind of balance-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    /// External capital in, no source wallet
    Deposit = 1,
    /// External capital out, no destination wallet
    Withdraw = 2,
    /// Zero-sum move between two wallets
    Transfer = 3,
}

impl EntryKind {
    /// Stable name for logs and filters
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "DEPOSIT",
            EntryKind::Withdraw => "WITHDRAW",
            EntryKind::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome recorded for a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryStatus {
    /// Balance change committed
    Success = 1,
    /// Attempt recorded for observability, no balance change
    Failed = 2,
    /// Accepted but not yet committed
    Pending = 3,
}

impl EntryStatus {
    /// Stable name for logs and filters
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Success => "SUCCESS",
            EntryStatus::Failed => "FAILED",
            EntryStatus::Pending => "PENDING",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one balance-affecting event.
///
/// Append-only: once written an entry is never modified or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonic unique id
    pub id: u64,

    /// Source wallet (None for deposits)
    pub from: Option<UserId>,

    /// Destination wallet (None for withdrawals)
    pub to: Option<UserId>,

    /// Amount moved (always positive)
    pub amount: Decimal,

    /// Event kind
    pub kind: EntryKind,

    /// Recorded outcome
    pub status: EntryStatus,

    /// Optional free-text note
    pub memo: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// The other party of a transfer, from `user`'s point of view.
    ///
    /// None for one-sided entries and for entries `user` is not part of.
    pub fn counterparty_of(&self, user: &UserId) -> Option<&UserId> {
        match (&self.from, &self.to) {
            (Some(from), Some(to)) if from == user => Some(to),
            (Some(from), Some(to)) if to == user => Some(from),
            _ => None,
        }
    }

    /// Whether `user` appears on either side
    pub fn involves(&self, user: &UserId) -> bool {
        self.from.as_ref() == Some(user) || self.to.as_ref() == Some(user)
    }
}

/// Money-request state machine states.
///
/// PENDING is the only non-terminal state; the three target states are
/// final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RequestStatus {
    /// Awaiting the payer's decision
    Pending = 1,
    /// Payer accepted and the transfer committed
    Accepted = 2,
    /// Payer declined, no funds moved
    Declined = 3,
    /// Requester withdrew the request, no funds moved
    Canceled = 4,
}

impl RequestStatus {
    /// Terminal states admit no further transition
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Stable name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Accepted => "ACCEPTED",
            RequestStatus::Declined => "DECLINED",
            RequestStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pull-payment proposal awaiting the target's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyRequest {
    /// Unique request id (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Requester, the eventual payee
    pub from_user: UserId,

    /// The payer being asked
    pub to_user: UserId,

    /// Requested amount (always positive)
    pub amount: Decimal,

    /// Optional free-text note
    pub memo: Option<String>,

    /// Current state
    pub status: RequestStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl MoneyRequest {
    /// New request in PENDING state
    pub fn new(from_user: UserId, to_user: UserId, amount: Decimal, memo: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            from_user,
            to_user,
            amount,
            memo,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Copy with a new status
    pub fn with_status(&self, status: RequestStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_parse() {
        assert_eq!(Currency::parse("INR"), Some(Currency::INR));
        assert_eq!(Currency::parse("USD"), Some(Currency::USD));
        assert_eq!(Currency::parse("XYZ"), None);
    }

    #[test]
    fn test_wallet_with_balance_bumps_version() {
        let wallet = Wallet::new(UserId::new("u1"), Currency::INR);
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(wallet.version, 0);

        let updated = wallet.with_balance(Decimal::from(100));
        assert_eq!(updated.balance, Decimal::from(100));
        assert_eq!(updated.version, 1);
        assert_eq!(updated.currency, wallet.currency);
    }

    #[test]
    fn test_entry_counterparty() {
        let entry = LedgerEntry {
            id: 1,
            from: Some(UserId::new("alice")),
            to: Some(UserId::new("bob")),
            amount: Decimal::from(50),
            kind: EntryKind::Transfer,
            status: EntryStatus::Success,
            memo: None,
            created_at: Utc::now(),
        };

        assert_eq!(
            entry.counterparty_of(&UserId::new("alice")),
            Some(&UserId::new("bob"))
        );
        assert_eq!(
            entry.counterparty_of(&UserId::new("bob")),
            Some(&UserId::new("alice"))
        );
        assert_eq!(entry.counterparty_of(&UserId::new("carol")), None);
        assert!(entry.involves(&UserId::new("alice")));
        assert!(!entry.involves(&UserId::new("carol")));
    }

    #[test]
    fn test_deposit_has_no_counterparty() {
        let entry = LedgerEntry {
            id: 2,
            from: None,
            to: Some(UserId::new("alice")),
            amount: Decimal::from(10),
            kind: EntryKind::Deposit,
            status: EntryStatus::Success,
            memo: None,
            created_at: Utc::now(),
        };
        assert_eq!(entry.counterparty_of(&UserId::new("alice")), None);
        assert!(entry.involves(&UserId::new("alice")));
    }

    #[test]
    fn test_request_status_terminal() {
        let request = MoneyRequest::new(
            UserId::new("alice"),
            UserId::new("bob"),
            Decimal::from(200),
            None,
        );
        assert!(!request.status.is_terminal());

        assert!(request.with_status(RequestStatus::Accepted).status.is_terminal());
        assert!(request.with_status(RequestStatus::Declined).status.is_terminal());
        assert!(request.with_status(RequestStatus::Canceled).status.is_terminal());
    }
}
