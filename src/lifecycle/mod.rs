//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Ledger → Gateway + Notifier → Services → AppState
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → HTTP server drains, scheduler loop exits
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - A sweep in progress at shutdown finishes its current reconciliations;
//!   settlement is never interrupted half-way

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_handler, wait_for_signal};
pub use startup::{assemble, build_state, StartupError};
