//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, trace span, timeout, body limit)
//!     → donations.rs (initiate, verify, provider callback)
//!     → admin (bearer key, change approval, review queue, sweep)
//!     → error.rs (service error → status code + JSON body)
//! ```

pub mod donations;
pub mod error;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, HttpServer};
