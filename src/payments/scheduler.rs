//! Reconciliation sweep.
//!
//! # Responsibilities
//! - Periodically replay orphaned initiations into the ledger
//! - Flag transactions that exhausted their attempts for manual review
//! - Re-verify stuck pending transactions with bounded parallelism
//!
//! # Design Decisions
//! - Minutes, not seconds: providers settle asynchronously
//! - A grace period keeps the sweep away from checkouts still in progress
//! - Exhausted transactions are flagged, never failed: an outage is not a
//!   declined payment
//! - Each reconciliation runs in its own task with a deadline so one hung
//!   provider call cannot stall the rest of the sweep
//! - Overlapping sweeps (or several instances) are safe because settlement
//!   is a conditional update in the ledger

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::SchedulerConfig;
use crate::ledger::{GatewayTransaction, LedgerStore};
use crate::observability::metrics;
use crate::payments::reconcile::ReconciliationEngine;
use crate::payments::recovery::RecoveryJournal;
use crate::payments::types::ReconcileOutcome;
use crate::resilience::{retry_due, with_deadline};

const EXHAUSTED_REASON: &str = "verification attempts exhausted";

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Orphaned initiations written to the ledger.
    pub repaired: usize,
    /// Transactions newly flagged for review.
    pub flagged: usize,
    /// Candidates skipped because their backoff has not elapsed.
    pub deferred: usize,
    /// Transactions handed to the engine.
    pub examined: usize,
    /// Now terminal (settled here or by a concurrent caller).
    pub settled: usize,
    pub still_pending: usize,
    /// Gateway, ledger or deadline failures; retried next sweep.
    pub errors: usize,
}

/// Drives the reconciliation engine on a timer.
pub struct ReconciliationScheduler {
    engine: Arc<ReconciliationEngine>,
    ledger: Arc<dyn LedgerStore>,
    journal: Arc<RecoveryJournal>,
    config: SchedulerConfig,
}

impl ReconciliationScheduler {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        ledger: Arc<dyn LedgerStore>,
        journal: Arc<RecoveryJournal>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            engine,
            ledger,
            journal,
            config,
        }
    }

    /// Run sweeps until shutdown is signalled.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Reconciliation scheduler disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            grace_period_secs = self.config.grace_period_secs,
            max_attempts = self.config.max_attempts,
            "Reconciliation scheduler starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    tracing::info!(
                        repaired = report.repaired,
                        flagged = report.flagged,
                        deferred = report.deferred,
                        examined = report.examined,
                        settled = report.settled,
                        still_pending = report.still_pending,
                        errors = report.errors,
                        "Reconciliation sweep finished"
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reconciliation scheduler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Perform a single sweep.
    pub async fn sweep_once(&self) -> SweepReport {
        let start = Instant::now();
        let now = Utc::now();
        let mut report = SweepReport::default();

        if !self.journal.is_empty() {
            report.repaired = self.journal.replay(self.ledger.as_ref()).await;
        }

        report.flagged = self.flag_exhausted(now).await;

        let older_than = now - chrono::Duration::seconds(self.config.grace_period_secs as i64);
        let candidates = match self.ledger.list_pending(older_than, self.config.max_attempts).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list pending transactions");
                report.errors += 1;
                metrics::record_sweep(start);
                return report;
            }
        };

        let base = Duration::from_secs(self.config.backoff_base_secs);
        let max = Duration::from_secs(self.config.backoff_max_secs);
        let (due, deferred): (Vec<GatewayTransaction>, Vec<GatewayTransaction>) = candidates
            .into_iter()
            .partition(|tx| retry_due(tx.attempts, tx.last_verified_at, now, base, max));
        report.deferred = deferred.len();
        report.examined = due.len();

        let deadline = Duration::from_secs(self.config.per_call_timeout_secs);
        let results: Vec<(String, Result<ReconcileOutcome, String>)> = stream::iter(due)
            .map(|tx| {
                let engine = self.engine.clone();
                async move {
                    let reference = tx.reference;
                    let task_reference = reference.clone();
                    let handle = tokio::spawn(async move { engine.reconcile(&task_reference).await });
                    let result = match with_deadline(deadline, handle).await {
                        Ok(Ok(Ok(outcome))) => Ok(outcome),
                        Ok(Ok(Err(e))) => Err(e.to_string()),
                        Ok(Err(join_err)) => Err(format!("reconcile task failed: {}", join_err)),
                        Err(elapsed) => Err(elapsed.to_string()),
                    };
                    (reference, result)
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for (reference, result) in results {
            match result {
                Ok(outcome) if outcome.status.is_terminal() => report.settled += 1,
                Ok(_) => report.still_pending += 1,
                Err(reason) => {
                    tracing::warn!(reference = %reference, reason = %reason, "Sweep reconciliation failed");
                    report.errors += 1;
                }
            }
        }

        metrics::record_sweep(start);
        report
    }

    async fn flag_exhausted(&self, now: chrono::DateTime<Utc>) -> usize {
        let exhausted = match self.ledger.list_exhausted(self.config.max_attempts).await {
            Ok(exhausted) => exhausted,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list exhausted transactions");
                return 0;
            }
        };

        let mut flagged = 0;
        for tx in exhausted {
            match self.ledger.flag_for_review(tx.id, EXHAUSTED_REASON, now).await {
                Ok(true) => {
                    tracing::warn!(
                        reference = %tx.reference,
                        attempts = tx.attempts,
                        "Transaction still pending after max attempts; flagged for manual review"
                    );
                    metrics::record_flagged("attempts_exhausted");
                    flagged += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::error!(reference = %tx.reference, error = %e, "Failed to flag transaction"),
            }
        }
        flagged
    }
}
