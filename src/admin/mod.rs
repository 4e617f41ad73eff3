pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/review", get(get_review_queue))
        .route("/admin/sweep", post(run_sweep))
        .route("/admin/changes", get(list_changes).post(submit_change))
        .route("/admin/changes/{id}/approve", post(approve_change))
        .route("/admin/changes/{id}/reject", post(reject_change))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
