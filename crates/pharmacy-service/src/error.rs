//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use pharmacy_core::CommerceError;
use pharmacy_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but not allowed to touch the record.
    #[error("{message}")]
    Forbidden {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable reason.
        message: String,
    },

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - malformed input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists.
    #[error("{message}")]
    Conflict {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable reason.
        message: String,
    },

    /// A storefront rule rejected the request.
    #[error("{message}")]
    Rule {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable reason.
        message: String,
        /// Structured context, e.g. the goods that ran short.
        details: Option<serde_json::Value>,
    },

    /// The operation could not be committed; retrying may succeed.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "unauthorized".to_string(),
                None,
            ),
            Self::Forbidden { code, message } => (StatusCode::FORBIDDEN, code, message, None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            Self::Conflict { code, message } => (StatusCode::CONFLICT, code, message, None),
            Self::Rule {
                code,
                message,
                details,
            } => (StatusCode::BAD_REQUEST, code, message, details),
            Self::Unavailable(msg) => {
                tracing::warn!(reason = %msg, "Operation could not be committed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "settlement_failed",
                    "The operation could not be completed, please retry".to_string(),
                    None,
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

fn rule(code: &'static str, err: &CommerceError, details: Option<serde_json::Value>) -> ApiError {
    ApiError::Rule {
        code,
        message: err.to_string(),
        details,
    }
}

impl From<CommerceError> for ApiError {
    fn from(err: CommerceError) -> Self {
        use serde_json::json;

        match &err {
            CommerceError::NotFound { .. } => Self::NotFound(err.to_string()),
            CommerceError::Forbidden { reason } => Self::Forbidden {
                code: "forbidden",
                message: reason.clone(),
            },
            CommerceError::NotYetPaid => Self::Forbidden {
                code: "not_yet_paid",
                message: err.to_string(),
            },
            CommerceError::AlreadyExists { .. } => Self::Conflict {
                code: "already_exists",
                message: err.to_string(),
            },
            CommerceError::DuplicateLine(_) => Self::Conflict {
                code: "duplicate_line",
                message: err.to_string(),
            },
            CommerceError::DuplicateReview { .. } => Self::Conflict {
                code: "duplicate_review",
                message: err.to_string(),
            },
            CommerceError::ActivePromotionExists { .. } => Self::Conflict {
                code: "active_promotion_exists",
                message: err.to_string(),
            },
            CommerceError::SettlementFailed { reason } => Self::Unavailable(reason.clone()),
            CommerceError::AlreadyPaid => rule("already_paid", &err, None),
            CommerceError::AlreadyReceived => rule("already_received", &err, None),
            CommerceError::InsufficientFunds {
                balance_cents,
                required_cents,
            } => rule(
                "insufficient_funds",
                &err,
                Some(json!({
                    "balance_cents": balance_cents,
                    "required_cents": required_cents
                })),
            ),
            CommerceError::InsufficientBonuses {
                available,
                requested,
            } => rule(
                "insufficient_bonuses",
                &err,
                Some(json!({ "available": available, "requested": requested })),
            ),
            CommerceError::BonusCapExceeded {
                requested_cents,
                cap_cents,
            } => rule(
                "bonus_cap_exceeded",
                &err,
                Some(json!({
                    "requested_cents": requested_cents,
                    "cap_cents": cap_cents
                })),
            ),
            CommerceError::InsufficientStock { goods } => {
                rule("insufficient_stock", &err, Some(json!({ "goods": goods })))
            }
            CommerceError::InvalidQuantity(_) => rule("invalid_quantity", &err, None),
            CommerceError::NegativeBonus(_) => rule("negative_bonus", &err, None),
            CommerceError::LoyaltyCardBlocked => rule("loyalty_card_blocked", &err, None),
            CommerceError::EmptyPurchase => rule("empty_purchase", &err, None),
            CommerceError::InvalidPrice(_) => rule("invalid_price", &err, None),
            CommerceError::InvalidPromotion(_) => rule("invalid_promotion", &err, None),
            CommerceError::InvalidGrade(_) => rule("invalid_grade", &err, None),
            CommerceError::InvalidAmount(_) => rule("invalid_amount", &err, None),
            CommerceError::InvalidInput(_) | CommerceError::InvalidId(_) => {
                Self::BadRequest(err.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Domain(err) => err.into(),
            StoreError::Conflict(msg) => Self::Unavailable(msg),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharmacy_core::{GoodsId, StockShortage};

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        assert_eq!(
            status_of(CommerceError::not_found("purchase", "x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(CommerceError::forbidden("no")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(CommerceError::NotYetPaid), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(CommerceError::DuplicateLine(GoodsId::generate())),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(CommerceError::AlreadyPaid), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(CommerceError::SettlementFailed {
                reason: "busy".into()
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn store_failures_hide_details() {
        assert_eq!(
            status_of(StoreError::Database("disk on fire".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(StoreError::Conflict("lock timeout".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn stock_shortage_carries_details() {
        let goods_id = GoodsId::generate();
        let err = ApiError::from(CommerceError::InsufficientStock {
            goods: vec![StockShortage {
                goods_id,
                name: "Aspirin".into(),
                requested: 3,
                available: 1,
            }],
        });
        match err {
            ApiError::Rule { code, details, .. } => {
                assert_eq!(code, "insufficient_stock");
                let details = details.unwrap();
                assert_eq!(details["goods"][0]["name"], "Aspirin");
                assert_eq!(details["goods"][0]["available"], 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
