//! Notification boundary
//!
//! The ledger emits an event for every completed transfer, low-balance
//! breach, and request-state change. Delivery is fire-and-forget: a sink
//! that is slow, full, or broken never fails or rolls back a ledger
//! operation. The shipped [`ChannelSink`] hands events to a spawned drain
//! task over a bounded channel; dropped events are logged and forgotten.

use crate::types::UserId;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event categories emitted by the ledger core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    /// Payer side of a committed transfer
    TransferSent,
    /// Payee side of a committed transfer
    TransferReceived,
    /// Payer balance dropped below the configured threshold
    LowBalance,
    /// A money request was addressed to the user
    RequestCreated,
    /// The user's money request was accepted and paid
    RequestAccepted,
    /// The user's money request was declined
    RequestDeclined,
}

impl Category {
    /// Wire name of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::TransferSent => "transfer-sent",
            Category::TransferReceived => "transfer-received",
            Category::LowBalance => "low-balance",
            Category::RequestCreated => "request-created",
            Category::RequestAccepted => "request-accepted",
            Category::RequestDeclined => "request-declined",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observable ledger event addressed to a user
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// Addressee
    pub user: UserId,
    /// Event category
    pub category: Category,
    /// Structured event detail
    pub payload: serde_json::Value,
}

/// Receives ledger events. Implementations must not block and must not
/// fail the caller; delivery is best-effort by contract.
pub trait NotificationSink: Send + Sync {
    /// Hand over one event
    fn notify(&self, notification: Notification);
}

/// Sink backed by a bounded channel and a spawned drain task.
///
/// `notify` is non-blocking: when the channel is full or the drain task is
/// gone, the event is dropped with a warning.
pub struct ChannelSink {
    sender: mpsc::Sender<Notification>,
}

impl ChannelSink {
    /// Spawn the drain task and return the sink.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(capacity: usize) -> Arc<Self> {
        let (sender, mut receiver) = mpsc::channel::<Notification>(capacity);

        tokio::spawn(async move {
            while let Some(n) = receiver.recv().await {
                tracing::info!(
                    user = %n.user,
                    category = %n.category,
                    payload = %n.payload,
                    "notification dispatched"
                );
            }
        });

        Arc::new(Self { sender })
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.sender.try_send(notification) {
            tracing::warn!("notification dropped: {e}");
        }
    }
}

/// Sink that records every event in memory; used in tests.
#[derive(Default)]
pub struct MemorySink {
    events: parking_lot::Mutex<Vec<Notification>>,
}

impl MemorySink {
    /// New empty sink
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of everything received so far
    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    /// Events of one category addressed to `user`
    pub fn events_for(&self, user: &UserId, category: Category) -> Vec<Notification> {
        self.events
            .lock()
            .iter()
            .filter(|n| &n.user == user && n.category == category)
            .cloned()
            .collect()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, notification: Notification) {
        self.events.lock().push(notification);
    }
}
