//! Ledger record types and error definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Pending,
    Completed,
    Failed,
}

impl DonationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DonationStatus::Pending)
    }
}

/// Lifecycle state of a gateway transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// The donation status a settled transaction implies.
    pub fn donation_status(self) -> DonationStatus {
        match self {
            TransactionStatus::Pending => DonationStatus::Pending,
            TransactionStatus::Success => DonationStatus::Completed,
            TransactionStatus::Failed => DonationStatus::Failed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who gave. Name and phone are dropped for anonymous gifts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donor {
    pub name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

/// One intended or completed contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub donor: Donor,
    /// Amount in minor currency units (kobo, cents).
    pub amount_minor: u64,
    pub currency: String,
    pub status: DonationStatus,
    pub anonymous: bool,
    /// Shown on the public donor wall.
    pub visible: bool,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a transaction needs a human to look at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFlag {
    pub reason: String,
    pub flagged_at: DateTime<Utc>,
}

/// Provider-side counterpart of a donation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub id: Uuid,
    pub donation_id: Uuid,
    /// Idempotency key shared with the provider. Never changes.
    pub reference: String,
    pub access_code: Option<String>,
    pub status: TransactionStatus,
    /// Last raw status string the provider reported.
    pub provider_status: Option<String>,
    pub attempts: u32,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub callback_received_at: Option<DateTime<Utc>>,
    pub review: Option<ReviewFlag>,
    pub created_at: DateTime<Utc>,
}

/// Result of a conditional settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// This caller moved the transaction out of pending.
    Applied {
        transaction: GatewayTransaction,
        donation: Donation,
    },
    /// Someone else already settled it; the stored row is authoritative.
    Lost(GatewayTransaction),
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reference already exists.
    #[error("duplicate reference: {0}")]
    DuplicateReference(String),

    /// No such transaction.
    #[error("transaction not found: {0}")]
    NotFound(String),

    /// A settle was asked to move into a non-terminal state.
    #[error("invalid transition to {0}")]
    InvalidTransition(TransactionStatus),

    /// Backing storage is unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for ledger operations.
pub type StoreResult<T> = Result<T, StoreError>;
