//! Order persistence at the end of checkout.
//!
//! Runs after payment is confirmed. The gateway has no transactions, so
//! the order row and its item batch are two writes; the empty-batch case
//! is checked up front so a paid-for order can never be created with
//! nothing on it.

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{instrument, warn};

use dezora_luxe_core::{Amount, OrderStatus, UserId};

use crate::cart::Cart;
use crate::gateway::{AddressSnapshot, GatewayError, NewOrder, NewOrderItem, OrderRow, OrderStore};

/// Errors from order creation.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No cart line still resolves to a catalog product.
    #[error("no purchasable items in cart")]
    EmptyOrder,

    /// The order row itself could not be written.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The order row exists but its item batch failed to write. The
    /// payment reference identifies the order for manual follow-up.
    #[error("order {order_number} created but items failed (payment {reference}): {source}")]
    ItemsFailed {
        order_number: String,
        reference: String,
        source: GatewayError,
    },
}

/// Everything needed to persist an order.
#[derive(Debug)]
pub struct OrderRequest<'a> {
    pub cart: &'a Cart,
    /// `None` for guest checkout.
    pub user: Option<UserId>,
    pub total: Amount,
    pub shipping_address: AddressSnapshot,
    pub payment_reference: String,
    pub delivery_method: String,
}

/// Persist an order and its items.
///
/// Items are built only from cart lines whose product still exists. The
/// order number comes from the gateway's sequence; if that call fails the
/// order is still created under a locally minted number rather than
/// abandoning a charged customer.
///
/// The caller clears the cart after this returns `Ok`.
///
/// # Errors
///
/// [`OrderError::EmptyOrder`] before any write when no line is
/// purchasable; [`OrderError::ItemsFailed`] when the order row was written
/// but the item batch was not.
#[instrument(skip_all, fields(reference = %request.payment_reference))]
pub async fn create_order<S: OrderStore>(
    store: &S,
    request: OrderRequest<'_>,
) -> Result<OrderRow, OrderError> {
    let items: Vec<_> = request
        .cart
        .valid_lines()
        .filter_map(|line| {
            line.product
                .as_ref()
                .map(|product| (line.product_id, line.quantity, product.price))
        })
        .collect();
    if items.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    let order_number = match store.generate_order_number().await {
        Ok(number) => number,
        Err(e) => {
            warn!(error = %e, "Order number sequence unavailable, using fallback");
            fallback_order_number()
        }
    };

    let order = store
        .insert_order(NewOrder {
            user_id: request.user,
            order_number,
            total_amount: request.total,
            status: OrderStatus::Pending,
            shipping_address: request.shipping_address,
            payment_reference: request.payment_reference.clone(),
            delivery_method: request.delivery_method,
        })
        .await?;

    let batch = items
        .into_iter()
        .map(|(product_id, quantity, unit_price)| NewOrderItem {
            order_id: order.id,
            product_id,
            quantity,
            price: unit_price,
        })
        .collect();

    if let Err(e) = store.insert_order_items(batch).await {
        return Err(OrderError::ItemsFailed {
            order_number: order.order_number,
            reference: request.payment_reference,
            source: e,
        });
    }

    Ok(order)
}

/// Locally minted order number, used when the sequence RPC is down:
/// `ORD-<year>-<6 digits from the clock>`.
fn fallback_order_number() -> String {
    let now = Utc::now();
    format!(
        "ORD-{}-{:06}",
        now.year(),
        now.timestamp_millis().rem_euclid(1_000_000)
    )
}
