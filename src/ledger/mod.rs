//! Ledger subsystem.
//!
//! # Data Flow
//! ```text
//! Initiation:     create_pair(Donation, GatewayTransaction)  (both or neither)
//! Reconciliation: find_by_reference → settle(pending → terminal)  (compare-and-swap)
//!                                   → record_attempt              (gateway said "not yet")
//! Scheduler:      list_pending / list_exhausted → flag_for_review
//! ```
//!
//! # Design Decisions
//! - The store is the single source of truth and the linearization point
//! - Donations are never deleted (financial audit record)
//! - Terminal states are final; `settle` refuses anything else

pub mod memory;
pub mod store;
pub mod types;

pub use memory::InMemoryLedger;
pub use store::LedgerStore;
pub use types::{
    Donation, DonationStatus, Donor, GatewayTransaction, ReviewFlag, StoreError, StoreResult,
    TransactionStatus, Transition,
};
