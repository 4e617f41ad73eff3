//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the payment gateway:
//!     → timeouts.rs (every provider call has a deadline)
//!     → On failure: status stays pending, attempt recorded
//!     → backoff.rs (scheduler waits longer before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries happen in the scheduler, never inline in a request
//! - Jittered backoff prevents thundering herd against the provider

pub mod backoff;
pub mod timeouts;

pub use backoff::{calculate_backoff, retry_due};
pub use timeouts::with_deadline;
