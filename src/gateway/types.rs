//! Provider wire types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the initiation service asks the provider to set up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializeRequest {
    /// Amount in minor currency units.
    pub amount_minor: u64,
    pub email: String,
    pub currency: String,
    pub reference: String,
    pub callback_url: String,
    pub metadata: serde_json::Value,
}

/// Redirect handle returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub authorization_url: String,
    pub access_code: String,
}

/// Provider status collapsed to what the ledger can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifiedStatus {
    Success,
    Failed,
    /// Still in flight at the provider; try again later.
    Pending,
}

impl VerifiedStatus {
    /// Map the provider's vocabulary onto ours.
    ///
    /// Anything unrecognised stays pending: only an explicit provider verdict
    /// may fail a payment.
    pub fn from_provider(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "success" => VerifiedStatus::Success,
            "failed" | "reversed" | "abandoned" => VerifiedStatus::Failed,
            _ => VerifiedStatus::Pending,
        }
    }
}

/// Result of verifying a reference with the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub reference: String,
    /// Raw provider status string, kept for audit.
    pub provider_status: String,
    pub status: VerifiedStatus,
    pub amount_minor: u64,
    pub currency: String,
}

/// Errors that can occur when talking to the provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection failed or the provider returned garbage transport-wise.
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    /// The provider did not answer within the deadline.
    #[error("gateway timeout after {0} seconds")]
    Timeout(u64),

    /// The provider answered and said no.
    #[error("gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The provider answered with a body we could not interpret.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    /// Client misconfiguration (missing secret, bad URL).
    #[error("gateway misconfigured: {0}")]
    Config(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
