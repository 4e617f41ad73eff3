//! Mapping of service errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::approval::ApprovalError;
use crate::payments::PaymentError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error("{0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    retryable: bool,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Payment(e) => match e {
                PaymentError::Validation(_) => StatusCode::BAD_REQUEST,
                PaymentError::Gateway(_) => StatusCode::BAD_GATEWAY,
                PaymentError::Persistence { .. } => StatusCode::SERVICE_UNAVAILABLE,
                PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
                PaymentError::SettlementMismatch { .. } => StatusCode::CONFLICT,
            },
            ApiError::Approval(e) => match e {
                ApprovalError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
                ApprovalError::NotFound(_) => StatusCode::NOT_FOUND,
                ApprovalError::AlreadyDecided { .. } => StatusCode::CONFLICT,
                ApprovalError::Invalid(_) => StatusCode::BAD_REQUEST,
                ApprovalError::Apply(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ApprovalError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            // Provider details stay in the logs.
            ApiError::Payment(PaymentError::Gateway(_)) => {
                "payment provider unavailable, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (reference, retryable) = match &self {
            ApiError::Payment(e) => (e.reference().map(String::from), e.is_retryable()),
            _ => (None, false),
        };

        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.message(),
            reference,
            retryable,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::ledger::StoreError;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (PaymentError::Validation("x".into()).into(), StatusCode::BAD_REQUEST),
            (
                PaymentError::Gateway(GatewayError::Unreachable("down".into())).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PaymentError::Persistence {
                    reference: Some("DON-1".into()),
                    source: StoreError::Unavailable("disk".into()),
                }
                .into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (PaymentError::NotFound("DON-1".into()).into(), StatusCode::NOT_FOUND),
            (
                PaymentError::SettlementMismatch {
                    reference: "DON-1".into(),
                    detail: "amount".into(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                ApprovalError::PermissionDenied {
                    actor: "eve".into(),
                    required: crate::approval::Role::Admin,
                }
                .into(),
                StatusCode::FORBIDDEN,
            ),
            (
                ApprovalError::AlreadyDecided {
                    id: Uuid::new_v4(),
                    status: crate::approval::ChangeStatus::Approved,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{}", error);
        }
    }
}
