//! Notification port and the log-only implementation.

use async_trait::async_trait;
use thiserror::Error;

use crate::ledger::Donation;

/// Errors a notifier may report. They are logged, never propagated.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification rejected ({0})")]
    Rejected(u16),
}

/// Outbound notifications fired after a donation settles.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Receipt to the donor.
    async fn send_receipt(&self, donation: &Donation, reference: &str) -> Result<(), NotifyError>;

    /// Heads-up to the site administrators.
    async fn notify_admins(&self, donation: &Donation, reference: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send_receipt(&self, donation: &Donation, reference: &str) -> Result<(), NotifyError> {
        tracing::info!(
            reference = %reference,
            donation_id = %donation.id,
            amount_minor = donation.amount_minor,
            currency = %donation.currency,
            "Receipt notification"
        );
        Ok(())
    }

    async fn notify_admins(&self, donation: &Donation, reference: &str) -> Result<(), NotifyError> {
        tracing::info!(
            reference = %reference,
            donation_id = %donation.id,
            anonymous = donation.anonymous,
            "Admin notification"
        );
        Ok(())
    }
}
