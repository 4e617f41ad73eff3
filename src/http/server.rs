//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with donor, admin and health handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Bind server to listener
//! - Drain in-flight requests on shutdown
//!
//! # Design Decisions
//! - Request ID is set outermost so every trace span carries it
//! - Handlers share one cloneable `AppState` of `Arc`s

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{routing::get, Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::approval::{ChangeRouter, TableStore};
use crate::config::ServiceConfig;
use crate::http::donations;
use crate::ledger::LedgerStore;
use crate::payments::{
    InitiationService, ReconciliationEngine, ReconciliationScheduler, RecoveryJournal,
};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub ledger: Arc<dyn LedgerStore>,
    pub journal: Arc<RecoveryJournal>,
    pub initiation: Arc<InitiationService>,
    pub engine: Arc<ReconciliationEngine>,
    pub scheduler: Arc<ReconciliationScheduler>,
    pub changes: Arc<ChangeRouter>,
    pub tables: Arc<TableStore>,
    pub started_at: Instant,
}

/// HTTP server for the donation service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let router = Self::build_router(state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let timeout = Duration::from_secs(state.config.timeouts.request_secs);
        let body_limit = state.config.listener.max_body_size;

        Router::new()
            .route("/health", get(health))
            .merge(donations::routes())
            .merge(setup_admin_router(state.clone()))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(body_limit))
                    .layer(TimeoutLayer::new(timeout)),
            )
    }

    /// Run the server until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
