//! Paystack HTTP client with timeout and error handling.
//!
//! # Responsibilities
//! - Initialize a checkout for a reference
//! - Verify a reference's settlement status
//! - Handle timeouts and network errors gracefully
//!
//! # Security Constraints
//! - Secret key ONLY from environment variables
//! - Never log the secret key or full provider payloads

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::config::GatewayConfig;
use crate::gateway::provider::PaymentGateway;
use crate::gateway::types::{
    Authorization, GatewayError, GatewayResult, InitializeRequest, Verification, VerifiedStatus,
};
use crate::observability::metrics;
use crate::resilience::with_deadline;

/// Provider response envelope: `{ "status": bool, "message": str, "data": T }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    reference: String,
    amount: u64,
    currency: String,
}

/// Paystack REST client.
#[derive(Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: url::Url,
    secret_key: String,
    timeout_secs: u64,
}

impl PaystackClient {
    /// Create a client with an explicit secret.
    pub fn new(config: &GatewayConfig, secret_key: String) -> GatewayResult<Self> {
        if secret_key.trim().is_empty() {
            return Err(GatewayError::Config("secret key is empty".to_string()));
        }

        let base_url: url::Url = config.base_url.parse().map_err(|e| {
            GatewayError::Config(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        tracing::info!(base_url = %base_url, "Gateway client initialized");

        Ok(Self {
            http,
            base_url,
            secret_key,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Create a client reading the secret from `config.secret_key_env`.
    pub fn from_env(config: &GatewayConfig) -> GatewayResult<Self> {
        let secret = std::env::var(&config.secret_key_env).map_err(|_| {
            GatewayError::Config(format!("environment variable {} not set", config.secret_key_env))
        })?;
        Self::new(config, secret)
    }

    /// Append path segments to the base URL, keeping any path prefix it has.
    fn endpoint(&self, segments: &[&str]) -> GatewayResult<url::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Config("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and unwrap the provider envelope.
    async fn call<T>(&self, operation: &'static str, request: reqwest::RequestBuilder) -> GatewayResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let start = Instant::now();
        let deadline = Duration::from_secs(self.timeout_secs);

        let response = match with_deadline(deadline, request.bearer_auth(&self.secret_key).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => {
                metrics::record_gateway_request(operation, "timeout", start);
                return Err(GatewayError::Timeout(self.timeout_secs));
            }
            Ok(Err(e)) => {
                metrics::record_gateway_request(operation, "unreachable", start);
                return Err(GatewayError::Unreachable(e.to_string()));
            }
            Err(_) => {
                metrics::record_gateway_request(operation, "timeout", start);
                return Err(GatewayError::Timeout(self.timeout_secs));
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            metrics::record_gateway_request(operation, "unreachable", start);
            GatewayError::Unreachable(e.to_string())
        })?;

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            metrics::record_gateway_request(operation, "unavailable", start);
            return Err(GatewayError::Unreachable(format!("provider returned {}", status)));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            metrics::record_gateway_request(operation, "invalid", start);
            GatewayError::InvalidResponse(e.to_string())
        })?;

        if !status.is_success() || !envelope.status {
            metrics::record_gateway_request(operation, "rejected", start);
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: envelope.message,
            });
        }

        metrics::record_gateway_request(operation, "ok", start);
        envelope
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("missing data field".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize(&self, request: &InitializeRequest) -> GatewayResult<Authorization> {
        let url = self.endpoint(&["transaction", "initialize"])?;
        let body = serde_json::json!({
            "email": request.email,
            "amount": request.amount_minor,
            "currency": request.currency,
            "reference": request.reference,
            "callback_url": request.callback_url,
            "metadata": request.metadata,
        });

        let data: InitializeData = self
            .call("initialize", self.http.post(url).json(&body))
            .await?;

        tracing::debug!(reference = %request.reference, "Gateway checkout initialized");
        Ok(Authorization {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
        })
    }

    async fn verify(&self, reference: &str) -> GatewayResult<Verification> {
        let url = self.endpoint(&["transaction", "verify", reference])?;

        let data: VerifyData = self.call("verify", self.http.get(url)).await?;

        if data.reference != reference {
            return Err(GatewayError::InvalidResponse(format!(
                "asked for {} but provider answered for {}",
                reference, data.reference
            )));
        }

        Ok(Verification {
            reference: data.reference,
            status: VerifiedStatus::from_provider(&data.status),
            provider_status: data.status,
            amount_minor: data.amount,
            currency: data.currency,
        })
    }
}

impl std::fmt::Debug for PaystackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaystackClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
