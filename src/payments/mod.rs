//! Donation payment lifecycle.
//!
//! # Data Flow
//! ```text
//! POST /donations/initiate
//!     → initiation.rs (validate, reference, gateway initialize)
//!     → ledger (create donation + transaction, both pending)
//!     → recovery.rs (only if the ledger write failed)
//!
//! Callback / verify request / scheduler tick
//!     → reconcile.rs (read, verify with provider, conditional settle)
//!     → winner only: receipt + admin notification
//!
//! scheduler.rs
//!     → replay recovery journal
//!     → flag exhausted transactions for review
//!     → reconcile stale pending transactions (bounded parallelism)
//! ```

pub mod initiation;
pub mod reconcile;
pub mod recovery;
pub mod reference;
pub mod scheduler;
pub mod types;

pub use initiation::InitiationService;
pub use reconcile::ReconciliationEngine;
pub use recovery::{OrphanedInitiation, RecoveryJournal};
pub use reference::generate_reference;
pub use scheduler::{ReconciliationScheduler, SweepReport};
pub use types::{
    Disposition, DonationRequest, InitiatedDonation, PaymentError, ReconcileOutcome,
};
