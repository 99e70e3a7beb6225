use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use sack_types::error::MarketError;
use sack_types::ledger::LedgerError;

/// Where clients are sent when authentication or the role check fails.
pub const LOGIN_PATH: &str = "/login";

/// Handler error. Renders `{"error", "code"}` JSON, plus a `redirect` hint
/// for 401/403.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Market(MarketError::Unauthorized(msg.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Market(market) => match market {
                MarketError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", market.to_string()),
                MarketError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
                MarketError::Ledger(ledger) => match ledger {
                    LedgerError::InsufficientPoints { .. } => {
                        (StatusCode::CONFLICT, "INSUFFICIENT_POINTS", ledger.to_string())
                    }
                    LedgerError::TotalBelowUsed { .. } => {
                        (StatusCode::CONFLICT, "TOTAL_BELOW_USED", ledger.to_string())
                    }
                    LedgerError::NegativeTotal(_) | LedgerError::InvalidCost(_) => {
                        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", ledger.to_string())
                    }
                },
                MarketError::ToyUnavailable(_) => {
                    (StatusCode::CONFLICT, "TOY_UNAVAILABLE", market.to_string())
                }
                MarketError::NotInSack(_) => (StatusCode::NOT_FOUND, "NOT_IN_SACK", market.to_string()),
                MarketError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                MarketError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
                MarketError::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN", market.to_string()),
                MarketError::Backend(msg) => {
                    error!(error = %msg, "Backend failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "something went wrong, please try again".to_string(),
                    )
                }
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "something went wrong, please try again".to_string(),
                )
            }
        };

        let body = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => json!({
                "error": message,
                "code": code,
                "redirect": LOGIN_PATH,
            }),
            _ => json!({
                "error": message,
                "code": code,
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use sack_types::models::Role;
    use uuid::Uuid;

    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(status_of(MarketError::ToyUnavailable(id)), StatusCode::CONFLICT);
        assert_eq!(status_of(MarketError::NotInSack(id)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(MarketError::from(LedgerError::InsufficientPoints { required: 30, available: 10 })),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(MarketError::from(LedgerError::NegativeTotal(-1))), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(MarketError::validation("title is required")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(MarketError::Forbidden { required: Role::Admin }), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ApiError::unauthorized("no token")), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(MarketError::Backend("disk on fire".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
