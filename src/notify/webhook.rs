//! Mail relay webhook notifier.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::ledger::Donation;
use crate::notify::notifier::{Notifier, NotifyError};

#[derive(Serialize)]
struct WebhookPayload<'a> {
    kind: &'a str,
    reference: &'a str,
    recipients: Vec<&'a str>,
    donation: &'a Donation,
}

/// POSTs a JSON event per notification to a mail relay.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
    admin_emails: Vec<String>,
}

impl WebhookNotifier {
    pub fn new(url: String, admin_emails: Vec<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self { http, url, admin_emails })
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_receipt(&self, donation: &Donation, reference: &str) -> Result<(), NotifyError> {
        self.post(&WebhookPayload {
            kind: "donation_receipt",
            reference,
            recipients: vec![donation.donor.email.as_str()],
            donation,
        })
        .await
    }

    async fn notify_admins(&self, donation: &Donation, reference: &str) -> Result<(), NotifyError> {
        if self.admin_emails.is_empty() {
            return Ok(());
        }
        self.post(&WebhookPayload {
            kind: "donation_admin_notice",
            reference,
            recipients: self.admin_emails.iter().map(String::as_str).collect(),
            donation,
        })
        .await
    }
}
