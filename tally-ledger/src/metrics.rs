//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the ledger:
//!
//! - `ledger_transfers_total` - Committed transfers
//! - `ledger_transfers_failed_total` - Rejected or aborted transfers
//! - `ledger_deposits_total` - Committed deposits
//! - `ledger_withdrawals_total` - Committed withdrawals
//! - `ledger_entries_total` - Ledger entries appended (any status)
//! - `ledger_requests_total` - Money requests created
//! - `ledger_transfer_duration_seconds` - Transfer latency histogram
//!
//! Metrics live in an owned [`Registry`] so independent ledger instances
//! do not collide.

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed transfers
    pub transfers_total: IntCounter,

    /// Rejected or aborted transfers
    pub transfers_failed_total: IntCounter,

    /// Committed deposits
    pub deposits_total: IntCounter,

    /// Committed withdrawals
    pub withdrawals_total: IntCounter,

    /// Entries appended to the log
    pub entries_total: IntCounter,

    /// Money requests created
    pub requests_total: IntCounter,

    /// Transfer latency
    pub transfer_duration: Histogram,

    registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transfers_total = IntCounter::with_opts(Opts::new(
            "ledger_transfers_total",
            "Committed transfers",
        ))?;
        registry.register(Box::new(transfers_total.clone()))?;

        let transfers_failed_total = IntCounter::with_opts(Opts::new(
            "ledger_transfers_failed_total",
            "Rejected or aborted transfers",
        ))?;
        registry.register(Box::new(transfers_failed_total.clone()))?;

        let deposits_total = IntCounter::with_opts(Opts::new(
            "ledger_deposits_total",
            "Committed deposits",
        ))?;
        registry.register(Box::new(deposits_total.clone()))?;

        let withdrawals_total = IntCounter::with_opts(Opts::new(
            "ledger_withdrawals_total",
            "Committed withdrawals",
        ))?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let entries_total = IntCounter::with_opts(Opts::new(
            "ledger_entries_total",
            "Ledger entries appended",
        ))?;
        registry.register(Box::new(entries_total.clone()))?;

        let requests_total = IntCounter::with_opts(Opts::new(
            "ledger_requests_total",
            "Money requests created",
        ))?;
        registry.register(Box::new(requests_total.clone()))?;

        let transfer_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_transfer_duration_seconds",
                "Transfer latency",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(transfer_duration.clone()))?;

        Ok(Self {
            transfers_total,
            transfers_failed_total,
            deposits_total,
            withdrawals_total,
            entries_total,
            requests_total,
            transfer_duration,
            registry,
        })
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
