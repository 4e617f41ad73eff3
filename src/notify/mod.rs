//! Notification subsystem.
//!
//! # Data Flow
//! ```text
//! Reconciliation engine (winning transition only)
//!     → notifier.rs (Notifier::send_receipt, Notifier::notify_admins)
//!     → TracingNotifier (log line) | webhook.rs (POST to mail relay)
//! ```
//!
//! # Design Decisions
//! - Fire-and-forget: a failed notification never undoes a settlement
//! - Template content lives in the mail relay, not here

pub mod notifier;
pub mod webhook;

pub use notifier::{Notifier, NotifyError, TracingNotifier};
pub use webhook::WebhookNotifier;
