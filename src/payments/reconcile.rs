//! Reconciliation engine.
//!
//! # Responsibilities
//! - Ask the provider what happened to a reference
//! - Apply the verdict to the ledger at most once
//! - Fire receipt and admin notifications for the winning transition only
//!
//! # Concurrency
//! Callback, scheduler and manual retries may all reconcile the same
//! reference at once. There is no in-process lock: the ledger's conditional
//! `settle` picks exactly one winner and everyone else returns the winner's
//! status.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::gateway::{PaymentGateway, Verification, VerifiedStatus};
use crate::ledger::{
    Donation, GatewayTransaction, LedgerStore, TransactionStatus, Transition,
};
use crate::notify::Notifier;
use crate::observability::metrics;
use crate::payments::types::{Disposition, PaymentError, ReconcileOutcome};
use crate::resilience::with_deadline;

/// Verifies transactions with the provider and settles them in the ledger.
pub struct ReconciliationEngine {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
}

impl ReconciliationEngine {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            gateway,
            notifier,
            notify_timeout,
        }
    }

    /// Reconcile one reference and return its authoritative status.
    pub async fn reconcile(&self, reference: &str) -> Result<ReconcileOutcome, PaymentError> {
        let (transaction, donation) = self
            .ledger
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| PaymentError::NotFound(reference.to_string()))?;

        if transaction.status.is_terminal() {
            metrics::record_reconcile(Disposition::AlreadySettled.as_str());
            return Ok(outcome(reference, transaction.status, Disposition::AlreadySettled));
        }

        let verification = match self.gateway.verify(reference).await {
            Ok(verification) => verification,
            Err(e) => {
                tracing::warn!(
                    reference = %reference,
                    attempt = transaction.attempts + 1,
                    error = %e,
                    "Gateway verification failed"
                );
                if let Err(store_err) = self.ledger.record_attempt(transaction.id, None, Utc::now()).await {
                    tracing::error!(reference = %reference, error = %store_err, "Failed to record verification attempt");
                }
                metrics::record_reconcile("gateway_error");
                return Err(PaymentError::Gateway(e));
            }
        };

        let target = match verification.status {
            VerifiedStatus::Pending => return self.still_pending(&transaction, &verification).await,
            VerifiedStatus::Success => {
                if let Some(detail) = settlement_mismatch(&donation, &verification) {
                    return Err(self.mismatch(&transaction, &verification, detail).await);
                }
                TransactionStatus::Success
            }
            VerifiedStatus::Failed => TransactionStatus::Failed,
        };

        let transition = self
            .ledger
            .settle(
                transaction.id,
                TransactionStatus::Pending,
                target,
                &verification.provider_status,
                Utc::now(),
            )
            .await
            .map_err(|source| PaymentError::Persistence {
                reference: Some(reference.to_string()),
                source,
            })?;

        match transition {
            Transition::Applied { transaction, donation } => {
                tracing::info!(
                    reference = %reference,
                    status = %transaction.status,
                    attempts = transaction.attempts,
                    provider_status = %verification.provider_status,
                    "Transaction settled"
                );
                metrics::record_reconcile(Disposition::Applied.as_str());
                let status = transaction.status;
                // Runs detached: notifications for a committed transition
                // outlive a dropped caller.
                let delivery = tokio::spawn(fan_out(
                    self.notifier.clone(),
                    self.notify_timeout,
                    transaction,
                    donation,
                ));
                if let Err(e) = delivery.await {
                    tracing::error!(reference = %reference, error = %e, "Notification task panicked");
                }
                Ok(outcome(reference, status, Disposition::Applied))
            }
            Transition::Lost(current) => {
                tracing::debug!(
                    reference = %reference,
                    status = %current.status,
                    "Concurrent reconciliation settled first"
                );
                metrics::record_reconcile(Disposition::TransitionLost.as_str());
                Ok(outcome(reference, current.status, Disposition::TransitionLost))
            }
        }
    }

    /// Record the donor's return from checkout, then reconcile.
    pub async fn handle_callback(&self, reference: &str) -> Result<ReconcileOutcome, PaymentError> {
        self.ledger.record_callback(reference, Utc::now()).await?;
        self.reconcile(reference).await
    }

    async fn still_pending(
        &self,
        transaction: &GatewayTransaction,
        verification: &Verification,
    ) -> Result<ReconcileOutcome, PaymentError> {
        let updated = self
            .ledger
            .record_attempt(transaction.id, Some(&verification.provider_status), Utc::now())
            .await
            .map_err(|source| PaymentError::Persistence {
                reference: Some(transaction.reference.clone()),
                source,
            })?;

        tracing::debug!(
            reference = %transaction.reference,
            provider_status = %verification.provider_status,
            attempts = updated.attempts,
            "Provider has not settled yet"
        );
        metrics::record_reconcile(Disposition::StillPending.as_str());

        // A concurrent caller may have settled it while we were asking.
        let disposition = if updated.status.is_terminal() {
            Disposition::TransitionLost
        } else {
            Disposition::StillPending
        };
        Ok(outcome(&transaction.reference, updated.status, disposition))
    }

    async fn mismatch(
        &self,
        transaction: &GatewayTransaction,
        verification: &Verification,
        detail: String,
    ) -> PaymentError {
        let now = Utc::now();
        tracing::error!(
            reference = %transaction.reference,
            detail = %detail,
            "Provider settlement disagrees with ledger; flagging for review"
        );

        if let Err(e) = self
            .ledger
            .record_attempt(transaction.id, Some(&verification.provider_status), now)
            .await
        {
            tracing::error!(reference = %transaction.reference, error = %e, "Failed to record verification attempt");
        }
        match self.ledger.flag_for_review(transaction.id, &detail, now).await {
            Ok(true) => metrics::record_flagged("settlement_mismatch"),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(reference = %transaction.reference, error = %e, "Failed to flag transaction")
            }
        }
        metrics::record_reconcile("settlement_mismatch");

        PaymentError::SettlementMismatch {
            reference: transaction.reference.clone(),
            detail,
        }
    }
}

/// Side effects of the winning transition. Failures are logged only.
async fn fan_out(
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
    transaction: GatewayTransaction,
    donation: Donation,
) {
    let reference = transaction.reference.as_str();
    if transaction.status != TransactionStatus::Success {
        tracing::info!(reference = %reference, "Payment failed; no receipt sent");
        return;
    }

    match with_deadline(notify_timeout, notifier.send_receipt(&donation, reference)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(reference = %reference, error = %e, "Receipt notification failed"),
        Err(e) => tracing::warn!(reference = %reference, error = %e, "Receipt notification timed out"),
    }
    match with_deadline(notify_timeout, notifier.notify_admins(&donation, reference)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(reference = %reference, error = %e, "Admin notification failed"),
        Err(e) => tracing::warn!(reference = %reference, error = %e, "Admin notification timed out"),
    }
}

fn outcome(reference: &str, status: TransactionStatus, disposition: Disposition) -> ReconcileOutcome {
    ReconcileOutcome {
        reference: reference.to_string(),
        status,
        disposition,
    }
}

fn settlement_mismatch(donation: &Donation, verification: &Verification) -> Option<String> {
    if verification.amount_minor != donation.amount_minor {
        return Some(format!(
            "provider settled {} but ledger expects {}",
            verification.amount_minor, donation.amount_minor
        ));
    }
    if !verification.currency.eq_ignore_ascii_case(&donation.currency) {
        return Some(format!(
            "provider settled in {} but ledger expects {}",
            verification.currency, donation.currency
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaymentConfig;
    use crate::gateway::{SandboxGateway, SandboxOutcome};
    use crate::ledger::{DonationStatus, InMemoryLedger};
    use crate::notify::NotifyError;
    use crate::payments::initiation::InitiationService;
    use crate::payments::recovery::RecoveryJournal;
    use crate::payments::types::DonationRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingNotifier {
        receipts: AtomicUsize,
        admin: AtomicUsize,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send_receipt(&self, _: &Donation, _: &str) -> Result<(), NotifyError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.receipts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NotifyError::Transport("smtp down".into()));
            }
            Ok(())
        }

        async fn notify_admins(&self, _: &Donation, _: &str) -> Result<(), NotifyError> {
            self.admin.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        ledger: Arc<InMemoryLedger>,
        gateway: Arc<SandboxGateway>,
        notifier: Arc<CountingNotifier>,
        engine: Arc<ReconciliationEngine>,
        initiation: InitiationService,
    }

    fn harness(notifier: CountingNotifier) -> Harness {
        let ledger = Arc::new(InMemoryLedger::new());
        let gateway = Arc::new(SandboxGateway::new());
        let notifier = Arc::new(notifier);
        let engine = Arc::new(ReconciliationEngine::new(
            ledger.clone(),
            gateway.clone(),
            notifier.clone(),
            Duration::from_secs(1),
        ));
        let initiation = InitiationService::new(
            ledger.clone(),
            gateway.clone(),
            Arc::new(RecoveryJournal::new()),
            PaymentConfig::default(),
            "http://localhost/cb".into(),
        );
        Harness { ledger, gateway, notifier, engine, initiation }
    }

    async fn initiate(h: &Harness) -> String {
        h.initiation
            .initiate(DonationRequest {
                amount_minor: 5000,
                currency: "NGN".into(),
                email: "a@b.com".into(),
                name: None,
                phone: None,
                anonymous: false,
                visible: true,
                message: None,
            })
            .await
            .unwrap()
            .reference
    }

    #[tokio::test]
    async fn test_success_settles_and_notifies() {
        let h = harness(CountingNotifier::default());
        let reference = initiate(&h).await;

        let result = h.engine.reconcile(&reference).await.unwrap();
        assert_eq!(result.status, TransactionStatus::Success);
        assert_eq!(result.disposition, Disposition::Applied);

        let (tx, donation) = h.ledger.find_by_reference(&reference).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Success);
        assert_eq!(tx.attempts, 1);
        assert!(tx.last_verified_at.is_some());
        assert_eq!(donation.status, DonationStatus::Completed);
        assert_eq!(h.notifier.receipts.load(Ordering::SeqCst), 1);
        assert_eq!(h.notifier.admin.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminal_is_pure_read() {
        let h = harness(CountingNotifier::default());
        let reference = initiate(&h).await;
        h.engine.reconcile(&reference).await.unwrap();
        let before = h.ledger.find_by_reference(&reference).await.unwrap().unwrap();

        let again = h.engine.reconcile(&reference).await.unwrap();
        assert_eq!(again.disposition, Disposition::AlreadySettled);
        assert_eq!(again.status, TransactionStatus::Success);
        assert_eq!(h.gateway.verify_calls(), 1);
        assert_eq!(h.notifier.receipts.load(Ordering::SeqCst), 1);
        assert_eq!(h.ledger.find_by_reference(&reference).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let h = harness(CountingNotifier::default());
        let err = h.engine.reconcile("DON-0-NOPE").await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(_)));
        assert_eq!(h.gateway.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_gateway_error_counts_attempt() {
        let h = harness(CountingNotifier::default());
        let reference = initiate(&h).await;
        h.gateway.set_outcome(&reference, SandboxOutcome::Unreachable);

        let err = h.engine.reconcile(&reference).await.unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
        assert!(err.is_retryable());

        let (tx, donation) = h.ledger.find_by_reference(&reference).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.attempts, 1);
        assert_eq!(donation.status, DonationStatus::Pending);
    }

    #[tokio::test]
    async fn test_ongoing_stays_pending() {
        let h = harness(CountingNotifier::default());
        let reference = initiate(&h).await;
        h.gateway.set_outcome(&reference, SandboxOutcome::Ongoing);

        let result = h.engine.reconcile(&reference).await.unwrap();
        assert_eq!(result.status, TransactionStatus::Pending);
        assert_eq!(result.disposition, Disposition::StillPending);

        let (tx, _) = h.ledger.find_by_reference(&reference).await.unwrap().unwrap();
        assert_eq!(tx.attempts, 1);
        assert_eq!(tx.provider_status.as_deref(), Some("ongoing"));
    }

    #[tokio::test]
    async fn test_failed_payment_sends_no_receipt() {
        let h = harness(CountingNotifier::default());
        let reference = initiate(&h).await;
        h.gateway.set_outcome(&reference, SandboxOutcome::Failed);

        let result = h.engine.reconcile(&reference).await.unwrap();
        assert_eq!(result.status, TransactionStatus::Failed);

        let (_, donation) = h.ledger.find_by_reference(&reference).await.unwrap().unwrap();
        assert_eq!(donation.status, DonationStatus::Failed);
        assert_eq!(h.notifier.receipts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_amount_mismatch_flags_for_review() {
        let h = harness(CountingNotifier::default());
        let reference = initiate(&h).await;
        h.gateway.set_outcome(&reference, SandboxOutcome::SuccessWithAmount(4000));

        let err = h.engine.reconcile(&reference).await.unwrap_err();
        assert!(matches!(err, PaymentError::SettlementMismatch { .. }));

        let (tx, donation) = h.ledger.find_by_reference(&reference).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.review.is_some());
        assert_eq!(donation.status, DonationStatus::Pending);
        assert_eq!(h.notifier.receipts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_settlement() {
        let h = harness(CountingNotifier { fail: true, ..Default::default() });
        let reference = initiate(&h).await;

        let result = h.engine.reconcile(&reference).await.unwrap();
        assert_eq!(result.status, TransactionStatus::Success);

        let (tx, _) = h.ledger.find_by_reference(&reference).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Success);
        assert_eq!(h.notifier.receipts.load(Ordering::SeqCst), 1);
        assert_eq!(h.notifier.admin.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reconcile_single_winner() {
        let h = harness(CountingNotifier::default());
        let reference = initiate(&h).await;
        h.gateway.set_verify_delay(Some(Duration::from_millis(50)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = h.engine.clone();
            let reference = reference.clone();
            handles.push(tokio::spawn(async move { engine.reconcile(&reference).await }));
        }

        let mut applied = 0;
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.status, TransactionStatus::Success);
            if result.disposition == Disposition::Applied {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(h.notifier.receipts.load(Ordering::SeqCst), 1);
        let (tx, _) = h.ledger.find_by_reference(&reference).await.unwrap().unwrap();
        assert_eq!(tx.attempts, 1);
    }

    #[tokio::test]
    async fn test_callback_stamps_receipt_time() {
        let h = harness(CountingNotifier::default());
        let reference = initiate(&h).await;

        h.engine.handle_callback(&reference).await.unwrap();
        let (tx, _) = h.ledger.find_by_reference(&reference).await.unwrap().unwrap();
        assert!(tx.callback_received_at.is_some());

        let err = h.engine.handle_callback("DON-0-MISSING").await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_dropped_caller_still_delivers_receipt() {
        let h = harness(CountingNotifier {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let reference = initiate(&h).await;

        let cut_short =
            tokio::time::timeout(Duration::from_millis(50), h.engine.reconcile(&reference)).await;
        assert!(cut_short.is_err());

        let (tx, _) = h.ledger.find_by_reference(&reference).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Success);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(h.notifier.receipts.load(Ordering::SeqCst), 1);
        assert_eq!(h.notifier.admin.load(Ordering::SeqCst), 1);

        let again = h.engine.reconcile(&reference).await.unwrap();
        assert_eq!(again.disposition, Disposition::AlreadySettled);
        assert_eq!(h.notifier.receipts.load(Ordering::SeqCst), 1);
    }
}
