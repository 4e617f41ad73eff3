//! Payment provider port.

use async_trait::async_trait;

use crate::gateway::types::{Authorization, GatewayResult, InitializeRequest, Verification};

/// The external payment provider, as the core sees it.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout for `request.reference` and return the redirect handle.
    async fn initialize(&self, request: &InitializeRequest) -> GatewayResult<Authorization>;

    /// Ask the provider what actually happened to `reference`.
    async fn verify(&self, reference: &str) -> GatewayResult<Verification>;
}
