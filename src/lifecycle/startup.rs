//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Initialize subsystems in dependency order
//! - Hand the assembled state to the HTTP server and the scheduler
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Ledger first, then gateway and notifier, then the services on top
//! - Listeners start last (traffic only when ready)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::approval::{ChangeRouter, InMemoryChangeQueue, StaticRoleDirectory, TableStore};
use crate::config::validation::{validate_config, ValidationError};
use crate::config::{GatewayMode, ServiceConfig};
use crate::gateway::{GatewayError, PaymentGateway, PaystackClient, SandboxGateway};
use crate::http::server::AppState;
use crate::ledger::{InMemoryLedger, LedgerStore, StoreError};
use crate::notify::{Notifier, NotifyError, TracingNotifier, WebhookNotifier};
use crate::payments::{
    InitiationService, ReconciliationEngine, ReconciliationScheduler, RecoveryJournal,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", summarize(.0))]
    Config(Vec<ValidationError>),

    #[error("failed to open ledger: {0}")]
    Ledger(#[from] StoreError),

    #[error("failed to configure gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("failed to configure notifications: {0}")]
    Notify(#[from] NotifyError),
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Assemble every subsystem from a loaded configuration.
pub async fn build_state(config: ServiceConfig) -> Result<AppState, StartupError> {
    validate_config(&config).map_err(StartupError::Config)?;

    let (ledger, journal): (Arc<dyn LedgerStore>, _) = match &config.ledger.persistence_path {
        Some(path) => (
            Arc::new(InMemoryLedger::load_from_file(path).await?),
            RecoveryJournal::load_from_file(journal_path(path)).await?,
        ),
        None => {
            tracing::warn!("No ledger persistence path configured; records live in memory only");
            (Arc::new(InMemoryLedger::new()), RecoveryJournal::new())
        }
    };

    let gateway: Arc<dyn PaymentGateway> = match config.gateway.mode {
        GatewayMode::Paystack => Arc::new(PaystackClient::from_env(&config.gateway)?),
        GatewayMode::Sandbox => {
            tracing::warn!("Using sandbox payment gateway; no real money moves");
            Arc::new(SandboxGateway::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.notifications.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(
            url.clone(),
            config.notifications.admin_emails.clone(),
            Duration::from_secs(config.notifications.timeout_secs),
        )?),
        None => Arc::new(TracingNotifier),
    };

    Ok(assemble_with_journal(
        config,
        ledger,
        gateway,
        notifier,
        Arc::new(journal),
    ))
}

/// The recovery journal sits next to the ledger snapshot.
fn journal_path(ledger_path: &str) -> PathBuf {
    Path::new(ledger_path).with_extension("journal.json")
}

/// Wire services on top of already-built collaborators.
pub fn assemble(
    config: ServiceConfig,
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
) -> AppState {
    assemble_with_journal(config, ledger, gateway, notifier, Arc::new(RecoveryJournal::new()))
}

fn assemble_with_journal(
    config: ServiceConfig,
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    journal: Arc<RecoveryJournal>,
) -> AppState {

    let initiation = Arc::new(InitiationService::new(
        ledger.clone(),
        gateway.clone(),
        journal.clone(),
        config.payments.clone(),
        config.gateway.callback_url.clone(),
    ));

    let engine = Arc::new(ReconciliationEngine::new(
        ledger.clone(),
        gateway,
        notifier,
        Duration::from_secs(config.notifications.timeout_secs),
    ));

    let scheduler = Arc::new(ReconciliationScheduler::new(
        engine.clone(),
        ledger.clone(),
        journal.clone(),
        config.scheduler.clone(),
    ));

    let changes = Arc::new(ChangeRouter::new(
        Arc::new(StaticRoleDirectory::from_config(&config.roles)),
        Arc::new(InMemoryChangeQueue::new()),
    ));

    tracing::info!(
        gateway_mode = ?config.gateway.mode,
        scheduler_enabled = config.scheduler.enabled,
        role_assignments = config.roles.len(),
        "Subsystems initialized"
    );

    AppState {
        config: Arc::new(config),
        ledger,
        journal,
        initiation,
        engine,
        scheduler,
        changes,
        tables: Arc::new(TableStore::new()),
        started_at: Instant::now(),
    }
}
