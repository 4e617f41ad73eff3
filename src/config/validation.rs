//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, concurrency > 0)
//! - Check URLs and role tags parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::approval::Role;
use crate::config::schema::{GatewayMode, ServiceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.gateway.mode == GatewayMode::Paystack {
        if let Err(e) = url::Url::parse(&config.gateway.base_url) {
            errors.push(ValidationError::new("gateway.base_url", e.to_string()));
        }
    }
    if let Err(e) = url::Url::parse(&config.gateway.callback_url) {
        errors.push(ValidationError::new("gateway.callback_url", e.to_string()));
    }
    if config.gateway.timeout_secs == 0 {
        errors.push(ValidationError::new("gateway.timeout_secs", "must be > 0"));
    }

    if config.payments.supported_currencies.is_empty() {
        errors.push(ValidationError::new("payments.supported_currencies", "must not be empty"));
    }
    if config.payments.max_amount_minor == 0 {
        errors.push(ValidationError::new("payments.max_amount_minor", "must be > 0"));
    }

    let scheduler = &config.scheduler;
    if scheduler.interval_secs == 0 {
        errors.push(ValidationError::new("scheduler.interval_secs", "must be > 0"));
    }
    if scheduler.concurrency == 0 {
        errors.push(ValidationError::new("scheduler.concurrency", "must be > 0"));
    }
    if scheduler.max_attempts == 0 {
        errors.push(ValidationError::new("scheduler.max_attempts", "must be > 0"));
    }
    if scheduler.per_call_timeout_secs == 0 {
        errors.push(ValidationError::new("scheduler.per_call_timeout_secs", "must be > 0"));
    }
    if scheduler.backoff_base_secs > scheduler.backoff_max_secs {
        errors.push(ValidationError::new(
            "scheduler.backoff_base_secs",
            "must not exceed backoff_max_secs",
        ));
    }

    if let Some(webhook) = &config.notifications.webhook_url {
        if let Err(e) = url::Url::parse(webhook) {
            errors.push(ValidationError::new("notifications.webhook_url", e.to_string()));
        }
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must not be empty"));
    }

    for (actor, tags) in &config.roles {
        for tag in tags {
            if tag.parse::<Role>().is_err() {
                errors.push(ValidationError::new(
                    &format!("roles.{}", actor),
                    format!("unknown role '{}'", tag),
                ));
            }
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
