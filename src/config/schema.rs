//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the donation payment core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Payment gateway settings.
    pub gateway: GatewayConfig,

    /// Donation intake rules.
    pub payments: PaymentConfig,

    /// Background reconciliation sweep.
    pub scheduler: SchedulerConfig,

    /// Ledger persistence.
    pub ledger: LedgerConfig,

    /// Receipt and admin notifications.
    pub notifications: NotificationConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Actor id -> role tags.
    pub roles: BTreeMap<String, Vec<String>>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 64 * 1024,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Which gateway implementation to wire in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayMode {
    /// Real provider over HTTPS.
    Paystack,
    /// Deterministic in-process provider.
    Sandbox,
}

/// Payment gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub mode: GatewayMode,

    /// Provider API base URL.
    pub base_url: String,

    /// Where the provider redirects the donor after checkout.
    pub callback_url: String,

    /// Name of the environment variable holding the secret key.
    pub secret_key_env: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: GatewayMode::Sandbox,
            base_url: "https://api.paystack.co".to_string(),
            callback_url: "http://localhost:8080/donations/callback".to_string(),
            secret_key_env: "GATEWAY_SECRET_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Donation intake rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Accepted ISO currency codes.
    pub supported_currencies: Vec<String>,

    /// Upper bound for a single donation, in minor units.
    pub max_amount_minor: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            supported_currencies: ["NGN", "USD", "GHS", "ZAR", "KES"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            max_amount_minor: 100_000_000_000,
        }
    }
}

/// Reconciliation sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Run the background sweep.
    pub enabled: bool,

    /// Interval between sweeps in seconds.
    pub interval_secs: u64,

    /// Minimum transaction age before the sweep touches it.
    pub grace_period_secs: u64,

    /// Verification attempts before a transaction is flagged for review.
    pub max_attempts: u32,

    /// Reconciliations in flight per sweep.
    pub concurrency: usize,

    /// Deadline for a single reconciliation in seconds.
    pub per_call_timeout_secs: u64,

    /// Base delay for exponential backoff between attempts in seconds.
    pub backoff_base_secs: u64,

    /// Maximum backoff delay in seconds.
    pub backoff_max_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5 * 60,
            grace_period_secs: 10 * 60,
            max_attempts: 12,
            concurrency: 4,
            per_call_timeout_secs: 30,
            backoff_base_secs: 60,
            backoff_max_secs: 6 * 3600,
        }
    }
}

/// Ledger persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LedgerConfig {
    /// Snapshot file; `None` keeps the ledger in memory only.
    pub persistence_path: Option<String>,
}

/// Notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Mail relay webhook; logs only when unset.
    pub webhook_url: Option<String>,

    /// Recipients of the admin notice.
    pub admin_emails: Vec<String>,

    /// Timeout for a single notification in seconds.
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            admin_emails: Vec::new(),
            timeout_secs: 5,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
