//! Donation initiation.
//!
//! # Responsibilities
//! - Validate the donor's request against the configured intake rules
//! - Issue a unique reference and open a checkout with the provider
//! - Record the donation and its transaction as one unit
//!
//! # Failure Handling
//! - Provider declines or is down: nothing is written
//! - Ledger fails after the provider accepted: the records are parked in the
//!   recovery journal and the error still carries the reference

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::gateway::{InitializeRequest, PaymentGateway};
use crate::ledger::{
    Donation, DonationStatus, Donor, GatewayTransaction, LedgerStore, StoreError,
    TransactionStatus,
};
use crate::observability::metrics;
use crate::payments::recovery::RecoveryJournal;
use crate::payments::reference::generate_reference;
use crate::payments::types::{DonationRequest, InitiatedDonation, PaymentError};

const REFERENCE_ATTEMPTS: usize = 3;
const MAX_MESSAGE_LEN: usize = 500;

/// Turns a donation request into a pending ledger entry and a checkout link.
pub struct InitiationService {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    journal: Arc<RecoveryJournal>,
    config: PaymentConfig,
    callback_url: String,
}

impl InitiationService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        journal: Arc<RecoveryJournal>,
        config: PaymentConfig,
        callback_url: String,
    ) -> Self {
        Self {
            ledger,
            gateway,
            journal,
            config,
            callback_url,
        }
    }

    /// Initiate a donation.
    pub async fn initiate(&self, request: DonationRequest) -> Result<InitiatedDonation, PaymentError> {
        let request = self.validate(request).inspect_err(|_| metrics::record_initiation("invalid"))?;
        let now = Utc::now();
        let reference = self.unused_reference(now).await?;

        let checkout = InitializeRequest {
            amount_minor: request.amount_minor,
            email: request.email.clone(),
            currency: request.currency.clone(),
            reference: reference.clone(),
            callback_url: self.callback_url.clone(),
            metadata: serde_json::json!({
                "anonymous": request.anonymous,
                "donor_name": (if request.anonymous { None } else { request.name.clone() }),
            }),
        };

        let authorization = match self.gateway.initialize(&checkout).await {
            Ok(authorization) => authorization,
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "Gateway refused checkout");
                metrics::record_initiation("gateway_error");
                return Err(PaymentError::Gateway(e));
            }
        };

        let (donation, transaction) =
            build_records(&request, &reference, Some(authorization.access_code.clone()), now);
        let donation_id = donation.id;

        match self.ledger.create_pair(donation.clone(), transaction.clone()).await {
            Ok(()) => {}
            Err(source @ StoreError::DuplicateReference(_)) => {
                // Another donation owns the reference; a parked copy could never replay.
                tracing::error!(
                    reference = %reference,
                    error = %source,
                    "Reference taken between check and insert; checkout abandoned"
                );
                metrics::record_initiation("duplicate_reference");
                return Err(PaymentError::Persistence {
                    reference: Some(reference),
                    source,
                });
            }
            Err(source) => {
                tracing::error!(
                    reference = %reference,
                    error = %source,
                    "Ledger write failed after gateway accepted checkout; parked for recovery"
                );
                self.journal.record(donation, transaction).await;
                metrics::record_initiation("persistence_error");
                return Err(PaymentError::Persistence {
                    reference: Some(reference),
                    source,
                });
            }
        }

        tracing::info!(
            reference = %reference,
            donation_id = %donation_id,
            amount_minor = request.amount_minor,
            currency = %request.currency,
            "Donation initiated"
        );
        metrics::record_initiation("ok");

        Ok(InitiatedDonation {
            authorization_url: authorization.authorization_url,
            access_code: authorization.access_code,
            reference,
            donation_id,
        })
    }

    /// Check intake rules and normalise the request.
    fn validate(&self, mut request: DonationRequest) -> Result<DonationRequest, PaymentError> {
        if request.amount_minor == 0 {
            return Err(PaymentError::Validation("amount must be greater than zero".into()));
        }
        if request.amount_minor > self.config.max_amount_minor {
            return Err(PaymentError::Validation(format!(
                "amount exceeds the maximum of {}",
                self.config.max_amount_minor
            )));
        }

        request.email = request.email.trim().to_string();
        if request.email.is_empty() {
            return Err(PaymentError::Validation("email is required".into()));
        }
        if !request.email.contains('@') {
            return Err(PaymentError::Validation("email is malformed".into()));
        }

        request.currency = request.currency.trim().to_ascii_uppercase();
        if !self
            .config
            .supported_currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&request.currency))
        {
            return Err(PaymentError::Validation(format!(
                "unsupported currency '{}'",
                request.currency
            )));
        }

        if let Some(message) = &request.message {
            if message.chars().count() > MAX_MESSAGE_LEN {
                return Err(PaymentError::Validation("message is too long".into()));
            }
        }

        Ok(request)
    }

    /// Pick a reference nobody holds yet. The ledger's uniqueness check on
    /// insert remains the real guard.
    async fn unused_reference(&self, now: DateTime<Utc>) -> Result<String, PaymentError> {
        for _ in 0..REFERENCE_ATTEMPTS {
            let reference = generate_reference(now);
            if self.ledger.find_by_reference(&reference).await?.is_none() {
                return Ok(reference);
            }
            tracing::warn!(reference = %reference, "Reference collision, regenerating");
        }
        Err(PaymentError::Persistence {
            reference: None,
            source: StoreError::Unavailable(
                "could not allocate a unique reference".into(),
            ),
        })
    }
}

fn build_records(
    request: &DonationRequest,
    reference: &str,
    access_code: Option<String>,
    now: DateTime<Utc>,
) -> (Donation, GatewayTransaction) {
    let donor = if request.anonymous {
        Donor {
            name: None,
            email: request.email.clone(),
            phone: None,
        }
    } else {
        Donor {
            name: request.name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
        }
    };

    let donation = Donation {
        id: Uuid::new_v4(),
        donor,
        amount_minor: request.amount_minor,
        currency: request.currency.clone(),
        status: DonationStatus::Pending,
        anonymous: request.anonymous,
        visible: request.visible,
        message: request.message.clone(),
        created_at: now,
        updated_at: now,
    };

    let transaction = GatewayTransaction {
        id: Uuid::new_v4(),
        donation_id: donation.id,
        reference: reference.to_string(),
        access_code,
        status: TransactionStatus::Pending,
        provider_status: None,
        attempts: 0,
        last_verified_at: None,
        callback_received_at: None,
        review: None,
        created_at: now,
    };

    (donation, transaction)
}
