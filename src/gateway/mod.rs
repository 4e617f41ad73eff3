//! Payment gateway subsystem.
//!
//! # Data Flow
//! ```text
//! Initiation service
//!     → provider.rs (PaymentGateway::initialize)
//!     → client.rs (POST /transaction/initialize, bearer secret, deadline)
//!
//! Reconciliation engine
//!     → provider.rs (PaymentGateway::verify)
//!     → client.rs (GET /transaction/verify/{reference})
//!     → types.rs (provider status → success | failed | pending)
//! ```
//!
//! # Security Constraints
//! - Secret key ONLY from environment variables
//! - All provider calls have configurable timeouts
//! - Unknown provider statuses never fail a payment

pub mod client;
pub mod provider;
pub mod sandbox;
pub mod types;

pub use client::PaystackClient;
pub use provider::PaymentGateway;
pub use sandbox::{SandboxGateway, SandboxOutcome};
pub use types::{
    Authorization, GatewayError, GatewayResult, InitializeRequest, Verification, VerifiedStatus,
};
