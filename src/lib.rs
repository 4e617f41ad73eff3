//! Donation payment lifecycle and reconciliation service.

pub mod admin;
pub mod approval;
pub mod config;
pub mod gateway;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod notify;
pub mod observability;
pub mod payments;
pub mod resilience;

pub use config::ServiceConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
