//! Row types exchanged with the remote data gateway.
//!
//! These mirror the hosted tables (`products`, `cart_items`, `orders`,
//! `order_items`, `shipping_addresses`, `analytics_events`). The gateway
//! speaks JSON; all types round-trip through serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dezora_luxe_core::{AddressId, Amount, CartLineId, OrderId, OrderStatus, ProductId, UserId};

/// A catalog product.
///
/// Read-only to this service; the admin tooling owns product writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub price: Amount,
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
}

/// One row of the server-side cart, keyed by `(user_id, product_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRow {
    pub id: CartLineId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

/// A saved shipping address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub id: AddressId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `shipping_addresses`.
#[derive(Debug, Clone, Serialize)]
pub struct NewShippingAddress {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub is_default: bool,
}

/// Point-in-time address snapshot embedded in an order.
///
/// Deliberately not a foreign key: editing a saved address later must never
/// change what a past order shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// Insert payload for `orders`.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    /// Null for guest checkout.
    pub user_id: Option<UserId>,
    pub order_number: String,
    pub total_amount: Amount,
    pub status: OrderStatus,
    pub shipping_address: AddressSnapshot,
    pub payment_reference: String,
    pub delivery_method: String,
}

/// A created order row.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRow {
    pub id: OrderId,
    pub order_number: String,
    pub total_amount: Amount,
    pub status: OrderStatus,
    pub payment_reference: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `order_items`.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price snapshot at purchase time.
    pub price: Amount,
}

/// Fire-and-forget analytics event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    pub event_name: String,
    pub session_id: String,
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub order_id: Option<OrderId>,
    pub path: Option<String>,
    pub metadata: serde_json::Value,
}

/// Authenticated user returned by the hosted auth provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_images_default_on_missing_field() {
        // The gateway omits null columns; the reader must tolerate that.
        let json = r#"{
            "id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "name": "Silk Scarf",
            "category": "accessories",
            "price": 12500,
            "stock": 4
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert!(product.images.is_empty());
        assert_eq!(product.price, Amount::from_naira(12_500));
    }

    #[test]
    fn test_new_order_serializes_null_user_for_guests() {
        let order = NewOrder {
            user_id: None,
            order_number: "ORD-2026-000001".to_string(),
            total_amount: Amount::from_naira(14_800),
            status: OrderStatus::Pending,
            shipping_address: AddressSnapshot {
                name: "Ada Obi".to_string(),
                address: "1 Marina Rd".to_string(),
                city: "Abuja".to_string(),
                state: "FCT".to_string(),
                zip_code: String::new(),
                country: "Nigeria".to_string(),
            },
            payment_reference: "DZL-1-000001".to_string(),
            delivery_method: "GUO Logistics".to_string(),
        };

        let value = serde_json::to_value(&order).unwrap();
        assert!(value["user_id"].is_null());
        assert_eq!(value["status"], "pending");
        assert_eq!(value["shipping_address"]["name"], "Ada Obi");
    }
}
