//! Transaction history queries
//!
//! The log itself is append-only; this module is the read side. Entries
//! come back newest first, optionally narrowed by [`EntryFilter`].

use crate::{
    error::{Error, Result},
    storage::Storage,
    types::{EntryKind, EntryStatus, LedgerEntry, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Criteria for narrowing a wallet's history. Empty filter matches all.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Match one entry kind
    pub kind: Option<EntryKind>,

    /// Match one recorded status
    pub status: Option<EntryStatus>,

    /// Match transfers with this counterparty
    pub counterparty: Option<UserId>,

    /// Entries created at or after this instant
    pub after: Option<DateTime<Utc>>,

    /// Entries created at or before this instant
    pub before: Option<DateTime<Utc>>,

    /// Minimum amount, inclusive
    pub min_amount: Option<Decimal>,

    /// Maximum amount, inclusive
    pub max_amount: Option<Decimal>,

    /// Case-insensitive substring over memo and counterparty id
    pub search: Option<String>,

    /// Keep at most this many entries after ordering
    pub limit: Option<usize>,
}

impl EntryFilter {
    /// Whether `entry` (seen from `owner`'s wallet) passes the filter
    pub fn matches(&self, owner: &UserId, entry: &LedgerEntry) -> bool {
        if let Some(kind) = self.kind {
            if entry.kind != kind {
                return false;
            }
        }

        if let Some(status) = self.status {
            if entry.status != status {
                return false;
            }
        }

        if let Some(counterparty) = &self.counterparty {
            if entry.counterparty_of(owner) != Some(counterparty) {
                return false;
            }
        }

        if let Some(after) = self.after {
            if entry.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if entry.created_at > before {
                return false;
            }
        }

        if let Some(min) = self.min_amount {
            if entry.amount < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if entry.amount > max {
                return false;
            }
        }

        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let memo_hit = entry
                .memo
                .as_deref()
                .is_some_and(|memo| memo.to_lowercase().contains(&needle));
            let counterparty_hit = entry
                .counterparty_of(owner)
                .is_some_and(|user| user.as_str().to_lowercase().contains(&needle));
            if !memo_hit && !counterparty_hit {
                return false;
            }
        }

        true
    }
}

/// Read-side view over the append-only log
pub struct TransactionLog {
    storage: Arc<Storage>,
}

impl TransactionLog {
    /// Create a view over the shared storage handle
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// History of one wallet, newest first, narrowed by `filter`
    pub fn history(&self, user: &UserId, filter: &EntryFilter) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.storage.entries_for(user)?;
        entries.sort_by(|a, b| b.id.cmp(&a.id));

        let mut matched: Vec<LedgerEntry> = entries
            .into_iter()
            .filter(|entry| filter.matches(user, entry))
            .collect();

        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }

        Ok(matched)
    }

    /// Fetch a single entry by id
    pub fn entry(&self, id: u64) -> Result<LedgerEntry> {
        self.storage.get_entry(id)?.ok_or(Error::EntryNotFound(id))
    }
}
