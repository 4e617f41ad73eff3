use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::approval::{
    Actor, ApplyOutcome, ChangeApplier, ChangeRequest, Decision, PendingChange,
};
use crate::config::GatewayMode;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::ledger::GatewayTransaction;
use crate::payments::{PaymentError, SweepReport};

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub gateway_mode: GatewayMode,
    pub scheduler_enabled: bool,
    pub orphaned_initiations: usize,
    pub flagged_transactions: usize,
    pub pending_changes: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewParams {
    pub note: Option<String>,
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, ApiError> {
    let flagged = state
        .ledger
        .list_flagged()
        .await
        .map_err(PaymentError::from)?;
    let pending = state.changes.pending().await?;

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        gateway_mode: state.config.gateway.mode,
        scheduler_enabled: state.config.scheduler.enabled,
        orphaned_initiations: state.journal.len(),
        flagged_transactions: flagged.len(),
        pending_changes: pending.len(),
    }))
}

/// Transactions waiting for a human.
pub async fn get_review_queue(
    State(state): State<AppState>,
) -> Result<Json<Vec<GatewayTransaction>>, ApiError> {
    let flagged = state
        .ledger
        .list_flagged()
        .await
        .map_err(PaymentError::from)?;
    Ok(Json(flagged))
}

pub async fn run_sweep(State(state): State<AppState>) -> Json<SweepReport> {
    tracing::info!("Manual reconciliation sweep requested");
    Json(state.scheduler.sweep_once().await)
}

pub async fn submit_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChangeRequest>,
) -> Result<Response, ApiError> {
    let actor = actor_from(&headers)?;
    let tables = state.tables.clone();

    let outcome = state
        .changes
        .apply(&actor, request, |request| async move {
            tables.apply_change(&request).await
        })
        .await?;

    Ok(match outcome {
        ApplyOutcome::Applied(row) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "applied", "row": row })),
        )
            .into_response(),
        ApplyOutcome::Queued(change) => (StatusCode::ACCEPTED, Json(change)).into_response(),
    })
}

pub async fn list_changes(
    State(state): State<AppState>,
) -> Result<Json<Vec<PendingChange>>, ApiError> {
    Ok(Json(state.changes.pending().await?))
}

pub async fn approve_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<ReviewParams>,
) -> Result<Json<PendingChange>, ApiError> {
    decide(state, headers, id, Decision::Approve, params.note).await
}

pub async fn reject_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<ReviewParams>,
) -> Result<Json<PendingChange>, ApiError> {
    decide(state, headers, id, Decision::Reject, params.note).await
}

async fn decide(
    state: AppState,
    headers: HeaderMap,
    id: Uuid,
    decision: Decision,
    note: Option<String>,
) -> Result<Json<PendingChange>, ApiError> {
    let actor = actor_from(&headers)?;
    let reviewed = state
        .changes
        .review(&actor, id, decision, note, state.tables.as_ref())
        .await?;
    Ok(Json(reviewed))
}

fn actor_from(headers: &HeaderMap) -> Result<Actor, ApiError> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(Actor::new)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", ACTOR_HEADER)))
}
