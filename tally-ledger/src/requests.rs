//! Money-request workflow
//!
//! A request is a pull-payment proposal: the requester asks a target user
//! to pay. The target accepts (which runs a transfer, target → requester),
//! declines, or the requester cancels. PENDING is the only state that
//! admits a transition; ACCEPTED, DECLINED, and CANCELED are final.
//!
//! ACCEPTED is written only after the underlying transfer has committed.
//! A failed transfer leaves the request PENDING so the target can resolve
//! it again once funded.

use crate::{
    error::{Error, Result},
    metrics::Metrics,
    notify::{Category, Notification, NotificationSink},
    storage::Storage,
    transfer::TransferEngine,
    types::{LedgerEntry, MoneyRequest, RequestStatus, UserId},
};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout, Duration};
use uuid::Uuid;

/// Drives money requests through their state machine
pub struct RequestWorkflow {
    storage: Arc<Storage>,
    engine: Arc<TransferEngine>,
    sink: Arc<dyn NotificationSink>,
    metrics: Metrics,

    /// One async mutex per request, created on first transition
    locks: DashMap<Uuid, Arc<Mutex<()>>>,

    /// Bound on lock acquisition
    lock_wait: Duration,
}

impl RequestWorkflow {
    /// Create a workflow over the shared stores
    pub fn new(
        storage: Arc<Storage>,
        engine: Arc<TransferEngine>,
        sink: Arc<dyn NotificationSink>,
        metrics: Metrics,
        lock_wait: Duration,
    ) -> Self {
        Self {
            storage,
            engine,
            sink,
            metrics,
            locks: DashMap::new(),
            lock_wait,
        }
    }

    async fn acquire(&self, id: Uuid) -> Result<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        timeout(self.lock_wait, lock.lock_owned())
            .await
            .map_err(|_| Error::TransferFailed(format!("timed out waiting for request lock: {id}")))
    }

    fn load(&self, id: Uuid) -> Result<MoneyRequest> {
        self.storage
            .get_request(id)?
            .ok_or(Error::RequestNotFound(id))
    }

    fn require_pending(request: &MoneyRequest) -> Result<()> {
        if request.status.is_terminal() {
            return Err(Error::InvalidStateTransition {
                id: request.id,
                status: request.status,
            });
        }
        Ok(())
    }

    /// Propose a pull-payment: `from_user` asks `to_user` for `amount`.
    ///
    /// The new request starts PENDING and the target is notified.
    pub async fn create(
        &self,
        from_user: &UserId,
        to_user: &UserId,
        amount: Decimal,
        memo: Option<String>,
    ) -> Result<MoneyRequest> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidOperation(format!(
                "request amount must be positive, got {amount}"
            )));
        }
        if from_user == to_user {
            return Err(Error::InvalidOperation(format!(
                "cannot request money from yourself: {from_user}"
            )));
        }

        let request = MoneyRequest::new(from_user.clone(), to_user.clone(), amount, memo);
        self.storage.put_request(&request)?;
        self.metrics.requests_total.inc();

        tracing::info!(
            request_id = %request.id,
            from = %from_user,
            to = %to_user,
            amount = %amount,
            "money request created"
        );

        self.sink.notify(Notification {
            user: to_user.clone(),
            category: Category::RequestCreated,
            payload: json!({
                "request_id": request.id,
                "amount": amount,
                "from": from_user.as_str(),
                "memo": request.memo,
            }),
        });

        Ok(request)
    }

    /// Fetch one request
    pub fn request(&self, id: Uuid) -> Result<MoneyRequest> {
        self.load(id)
    }

    /// Requests addressed to `user`, newest first
    pub fn incoming_requests(&self, user: &UserId) -> Result<Vec<MoneyRequest>> {
        let mut requests = self.storage.requests_for(user)?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    /// Accept a request: the target pays the requester.
    ///
    /// Only `to_user` may accept, and only while PENDING. The status moves
    /// to ACCEPTED strictly after the transfer commits; if the transfer
    /// fails the request stays PENDING and the transfer's error is
    /// returned.
    pub async fn accept(&self, id: Uuid, caller: &UserId) -> Result<LedgerEntry> {
        let _guard = self.acquire(id).await?;

        let request = self.load(id)?;
        if &request.to_user != caller {
            return Err(Error::InvalidOperation(format!(
                "only the requested payer can accept request {id}"
            )));
        }
        Self::require_pending(&request)?;

        let memo = match &request.memo {
            Some(note) => format!("request accepted: {note}"),
            None => "request accepted".to_string(),
        };

        let entry = self
            .engine
            .transfer(&request.to_user, &request.from_user, request.amount, Some(memo))
            .await?;

        let accepted = request.with_status(RequestStatus::Accepted);
        self.storage.put_request(&accepted)?;

        tracing::info!(request_id = %id, entry_id = entry.id, "money request accepted");

        self.sink.notify(Notification {
            user: request.from_user.clone(),
            category: Category::RequestAccepted,
            payload: json!({
                "request_id": id,
                "amount": request.amount,
                "by": request.to_user.as_str(),
            }),
        });

        Ok(entry)
    }

    /// Decline a request. Only `to_user` may decline, and only while
    /// PENDING. No funds move.
    pub async fn decline(&self, id: Uuid, caller: &UserId) -> Result<MoneyRequest> {
        let _guard = self.acquire(id).await?;

        let request = self.load(id)?;
        if &request.to_user != caller {
            return Err(Error::InvalidOperation(format!(
                "only the requested payer can decline request {id}"
            )));
        }
        Self::require_pending(&request)?;

        let declined = request.with_status(RequestStatus::Declined);
        self.storage.put_request(&declined)?;

        tracing::info!(request_id = %id, "money request declined");

        self.sink.notify(Notification {
            user: request.from_user.clone(),
            category: Category::RequestDeclined,
            payload: json!({
                "request_id": id,
                "amount": request.amount,
                "by": request.to_user.as_str(),
            }),
        });

        Ok(declined)
    }

    /// Cancel a request. Only the requester may cancel, and only while
    /// PENDING. No funds move.
    pub async fn cancel(&self, id: Uuid, caller: &UserId) -> Result<MoneyRequest> {
        let _guard = self.acquire(id).await?;

        let request = self.load(id)?;
        if &request.from_user != caller {
            return Err(Error::InvalidOperation(format!(
                "only the requester can cancel request {id}"
            )));
        }
        Self::require_pending(&request)?;

        let canceled = request.with_status(RequestStatus::Canceled);
        self.storage.put_request(&canceled)?;

        tracing::info!(request_id = %id, "money request canceled");

        Ok(canceled)
    }
}
