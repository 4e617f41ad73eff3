//! Payment lifecycle types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::GatewayError;
use crate::ledger::{StoreError, TransactionStatus};

/// A donor's intent to give, as received from the website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRequest {
    /// Amount in minor currency units.
    pub amount_minor: u64,
    pub currency: String,
    /// Required even for anonymous gifts: the provider matches receipts on it.
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_visible() -> bool {
    true
}

/// What the donor's browser needs to continue to checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatedDonation {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
    pub donation_id: Uuid,
}

/// How a reconciliation call arrived at its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Terminal before this call; nothing was queried or written.
    AlreadySettled,
    /// This call performed the settlement.
    Applied,
    /// Another caller settled it first; their result is returned.
    TransitionLost,
    /// Provider has not decided yet.
    StillPending,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::AlreadySettled => "already_settled",
            Disposition::Applied => "applied",
            Disposition::TransitionLost => "transition_lost",
            Disposition::StillPending => "still_pending",
        }
    }
}

/// Answer returned to every reconciliation caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub reference: String,
    pub status: TransactionStatus,
    pub disposition: Disposition,
}

/// Errors surfaced by the payment services.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Bad input. Never retried.
    #[error("invalid donation: {0}")]
    Validation(String),

    /// Provider unreachable or declined. Retryable.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Ledger unavailable. Retryable; the reference is kept when one was issued.
    #[error("ledger error{}: {source}", for_reference(.reference))]
    Persistence {
        reference: Option<String>,
        #[source]
        source: StoreError,
    },

    /// Unknown reference. Not retried.
    #[error("unknown reference: {0}")]
    NotFound(String),

    /// Provider settled something other than what the ledger expects.
    #[error("settlement mismatch for {reference}: {detail}")]
    SettlementMismatch { reference: String, detail: String },
}

fn for_reference(reference: &Option<String>) -> String {
    reference
        .as_ref()
        .map(|r| format!(" for {}", r))
        .unwrap_or_default()
}

impl From<StoreError> for PaymentError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::NotFound(reference) => PaymentError::NotFound(reference),
            source => PaymentError::Persistence {
                reference: None,
                source,
            },
        }
    }
}

impl PaymentError {
    /// Whether the scheduler should try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Gateway(_) | PaymentError::Persistence { .. })
    }

    /// The reference involved, when known.
    pub fn reference(&self) -> Option<&str> {
        match self {
            PaymentError::Persistence { reference, .. } => reference.as_deref(),
            PaymentError::NotFound(reference) => Some(reference),
            PaymentError::SettlementMismatch { reference, .. } => Some(reference),
            _ => None,
        }
    }
}
