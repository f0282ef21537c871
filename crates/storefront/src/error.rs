//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::checkout::{CheckoutError, OrderError};
use crate::gateway::GatewayError;
use crate::services::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Data gateway operation failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Payment processor operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Checkout flow rejected a transition or input.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Session read or write failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// The cart has nothing purchasable in it.
    #[error("Cart is empty")]
    EmptyCart,

    /// Payment went through but the order is incomplete; the payment
    /// reference identifies it for support.
    #[error("Order incomplete for payment {reference}")]
    OrderIncomplete { reference: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyOrder => Self::EmptyCart,
            OrderError::Gateway(e) => Self::Gateway(e),
            OrderError::ItemsFailed { reference, .. } => Self::OrderIncomplete { reference },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Gateway(_)
                | Self::Payment(_)
                | Self::Session(_)
                | Self::Internal(_)
                | Self::OrderIncomplete { .. }
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Gateway(err) => {
                if matches!(err, GatewayError::NotFound(_)) {
                    StatusCode::NOT_FOUND
                } else if err.is_unique_violation() {
                    StatusCode::CONFLICT
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Checkout(_) | Self::EmptyCart | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            // The customer was charged; this must not read as their failure.
            Self::OrderIncomplete { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Gateway(err) => {
                if matches!(err, GatewayError::NotFound(_)) {
                    "Not found".to_string()
                } else if err.is_unique_violation() {
                    "Already exists".to_string()
                } else {
                    "Store service error".to_string()
                }
            }
            Self::Payment(_) => "Payment service error".to_string(),
            Self::OrderIncomplete { reference } => format!(
                "Your payment was received but the order could not be completed. \
                 Contact support with reference {reference}."
            ),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_hide_details() {
        let err = AppError::Gateway(GatewayError::Api {
            code: "42501".to_string(),
            message: "permission denied for table cart_items".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_duplicate_key_maps_to_conflict() {
        let err = AppError::Gateway(GatewayError::Api {
            code: "23505".to_string(),
            message: "duplicate key value violates unique constraint".to_string(),
        });
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_gateway_not_found_maps_to_404() {
        let err = AppError::Gateway(GatewayError::NotFound("products".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_checkout_errors_are_client_errors() {
        let err = AppError::Checkout(CheckoutError::MissingField("city"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_order_incomplete_is_server_error_with_reference() {
        let err = AppError::OrderIncomplete {
            reference: "DZL-1-000001".to_string(),
        };
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_empty_cart_from_order_error() {
        let err: AppError = crate::checkout::OrderError::EmptyOrder.into();
        assert!(matches!(err, AppError::EmptyCart));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
