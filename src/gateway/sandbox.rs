//! Deterministic in-process provider.
//!
//! Used when `gateway.mode = "sandbox"` and by the test suites. Checkouts are
//! remembered per reference; the verification verdict is scripted per
//! reference or falls back to a default.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::gateway::provider::PaymentGateway;
use crate::gateway::types::{
    Authorization, GatewayError, GatewayResult, InitializeRequest, Verification, VerifiedStatus,
};

/// Scripted verification verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxOutcome {
    Success,
    Failed,
    Abandoned,
    /// Provider still processing.
    Ongoing,
    /// Provider reports success for a different amount.
    SuccessWithAmount(u64),
    /// Provider cannot be reached.
    Unreachable,
}

#[derive(Debug, Clone)]
struct Checkout {
    amount_minor: u64,
    currency: String,
}

/// A fake provider that never leaves the process.
pub struct SandboxGateway {
    checkout_base: String,
    checkouts: DashMap<String, Checkout>,
    outcomes: DashMap<String, SandboxOutcome>,
    default_outcome: Mutex<SandboxOutcome>,
    reject_initialize: AtomicBool,
    verify_delay: Mutex<Option<Duration>>,
    initialize_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self {
            checkout_base: "https://sandbox.invalid/checkout".to_string(),
            checkouts: DashMap::new(),
            outcomes: DashMap::new(),
            default_outcome: Mutex::new(SandboxOutcome::Success),
            reject_initialize: AtomicBool::new(false),
            verify_delay: Mutex::new(None),
            initialize_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }

    /// Verdict for references without a scripted outcome.
    pub fn set_default_outcome(&self, outcome: SandboxOutcome) {
        *self.default_outcome.lock().unwrap_or_else(|e| e.into_inner()) = outcome;
    }

    pub fn set_outcome(&self, reference: &str, outcome: SandboxOutcome) {
        self.outcomes.insert(reference.to_string(), outcome);
    }

    /// Make `initialize` fail as if the provider declined.
    pub fn reject_initialize(&self, reject: bool) {
        self.reject_initialize.store(reject, Ordering::SeqCst);
    }

    /// Hold every verification for `delay` before answering.
    pub fn set_verify_delay(&self, delay: Option<Duration>) {
        *self.verify_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn outcome_for(&self, reference: &str) -> SandboxOutcome {
        self.outcomes
            .get(reference)
            .map(|o| *o.value())
            .unwrap_or_else(|| *self.default_outcome.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Default for SandboxGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn initialize(&self, request: &InitializeRequest) -> GatewayResult<Authorization> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);

        if self.reject_initialize.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "sandbox declined checkout".to_string(),
            });
        }

        self.checkouts.insert(
            request.reference.clone(),
            Checkout {
                amount_minor: request.amount_minor,
                currency: request.currency.clone(),
            },
        );

        let access_code = format!("sbx_{:016x}", fastrand::u64(..));
        Ok(Authorization {
            authorization_url: format!("{}/{}", self.checkout_base, access_code),
            access_code,
        })
    }

    async fn verify(&self, reference: &str) -> GatewayResult<Verification> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.verify_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let checkout = self
            .checkouts
            .get(reference)
            .map(|c| c.value().clone())
            .ok_or_else(|| GatewayError::Rejected {
                status: 404,
                message: "Transaction reference not found".to_string(),
            })?;

        let (provider_status, amount_minor) = match self.outcome_for(reference) {
            SandboxOutcome::Success => ("success", checkout.amount_minor),
            SandboxOutcome::Failed => ("failed", checkout.amount_minor),
            SandboxOutcome::Abandoned => ("abandoned", checkout.amount_minor),
            SandboxOutcome::Ongoing => ("ongoing", checkout.amount_minor),
            SandboxOutcome::SuccessWithAmount(amount) => ("success", amount),
            SandboxOutcome::Unreachable => {
                return Err(GatewayError::Unreachable("sandbox offline".to_string()));
            }
        };

        Ok(Verification {
            reference: reference.to_string(),
            provider_status: provider_status.to_string(),
            status: VerifiedStatus::from_provider(provider_status),
            amount_minor,
            currency: checkout.currency,
        })
    }
}
