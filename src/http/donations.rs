//! Donor-facing routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::payments::{DonationRequest, InitiatedDonation, ReconcileOutcome};

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub reference: String,
}

/// Query string the provider appends to the redirect.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub reference: Option<String>,
    pub trxref: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/donations/initiate", post(initiate))
        .route("/donations/verify", post(verify))
        .route("/donations/callback", get(callback))
}

async fn initiate(
    State(state): State<AppState>,
    Json(request): Json<DonationRequest>,
) -> Result<(StatusCode, Json<InitiatedDonation>), ApiError> {
    let initiated = state.initiation.initiate(request).await?;
    Ok((StatusCode::CREATED, Json(initiated)))
}

async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<ReconcileOutcome>, ApiError> {
    let reference = non_empty(&request.reference)?;
    let outcome = state.engine.reconcile(reference).await?;
    Ok(Json(outcome))
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<ReconcileOutcome>, ApiError> {
    let reference = params
        .reference
        .as_deref()
        .or(params.trxref.as_deref())
        .unwrap_or_default();
    let reference = non_empty(reference)?;
    let outcome = state.engine.handle_callback(reference).await?;
    Ok(Json(outcome))
}

fn non_empty(reference: &str) -> Result<&str, ApiError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ApiError::BadRequest("reference is required".into()));
    }
    Ok(reference)
}
