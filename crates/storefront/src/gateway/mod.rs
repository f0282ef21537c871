//! Remote data gateway client.
//!
//! # Architecture
//!
//! - The hosted platform exposes table-level CRUD over REST plus a handful
//!   of remote procedures; every call returns rows or a structured error
//! - The gateway is source of truth for products, carts, addresses, and
//!   orders - NO local sync, direct API calls
//! - In-memory caching via `moka` for product reads (5 minute TTL)
//!
//! The store traits ([`ProductCatalog`], [`ServerCartStore`], [`OrderStore`])
//! are the seams the cart and checkout logic is built against; the
//! [`GatewayClient`] implements all of them, and tests substitute in-memory
//! stores.

mod client;
pub mod types;

pub use client::GatewayClient;
pub use types::*;

use std::future::Future;

use thiserror::Error;

use dezora_luxe_core::{CartLineId, ProductId, UserId};

/// Postgres error code for a unique-constraint violation.
const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Errors that can occur when talking to the data gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway returned a structured error.
    #[error("gateway error {code}: {message}")]
    Api {
        /// Error code (Postgres SQLSTATE or auth error tag).
        code: String,
        /// Human-readable message from the gateway.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The configured service key is not a valid header value.
    #[error("invalid service key: {0}")]
    InvalidKey(String),
}

impl GatewayError {
    /// Whether this error is a duplicate-key conflict.
    ///
    /// Used to branch to an "already exists" user message.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Api { code, .. } if code == UNIQUE_VIOLATION_CODE)
    }
}

/// Read access to the product catalog.
pub trait ProductCatalog {
    /// Fetch a product by id. `Ok(None)` when the product no longer exists.
    fn product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, GatewayError>> + Send;
}

/// Server-side cart rows, one per `(user, product)` pair.
pub trait ServerCartStore {
    /// All cart rows for a user, newest first.
    fn cart_lines(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<CartItemRow>, GatewayError>> + Send;

    /// Upsert a row keyed on `(user_id, product_id)`.
    ///
    /// Conflict policy is replace-quantity: the stored quantity becomes
    /// `quantity`, it is not summed with the existing value.
    fn upsert_cart_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<CartItemRow, GatewayError>> + Send;

    /// Overwrite the quantity of one of the user's rows.
    ///
    /// The owner is part of the filter: the client talks to the gateway
    /// with a service-role key that bypasses row-level policies, so a row
    /// id leaked from another account must be inert here.
    fn set_cart_quantity(
        &self,
        user: UserId,
        line: CartLineId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Delete a single row owned by the user.
    fn delete_cart_line(
        &self,
        user: UserId,
        line: CartLineId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Delete all rows for a user.
    fn clear_cart(&self, user: UserId) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Order and order-item persistence.
pub trait OrderStore {
    /// Allocate a human-readable order number via the remote sequence.
    fn generate_order_number(&self)
    -> impl Future<Output = Result<String, GatewayError>> + Send;

    /// Insert one order row.
    fn insert_order(
        &self,
        order: NewOrder,
    ) -> impl Future<Output = Result<OrderRow, GatewayError>> + Send;

    /// Insert the order-item batch for an order.
    fn insert_order_items(
        &self,
        items: Vec<NewOrderItem>,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_detection() {
        let err = GatewayError::Api {
            code: "23505".to_string(),
            message: "duplicate key value violates unique constraint".to_string(),
        };
        assert!(err.is_unique_violation());

        let err = GatewayError::Api {
            code: "42501".to_string(),
            message: "permission denied".to_string(),
        };
        assert!(!err.is_unique_violation());

        assert!(!GatewayError::NotFound("products".to_string()).is_unique_violation());
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::Api {
            code: "42P01".to_string(),
            message: "relation does not exist".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "gateway error 42P01: relation does not exist"
        );
    }
}
