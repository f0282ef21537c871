//! Shopping cart.
//!
//! Two storage backends share one read model:
//!
//! - **Guest carts** live in the session ([`guest::GuestCart`]) as bare
//!   `(product_id, quantity)` entries
//! - **Authenticated carts** live in the gateway's `cart_items` table,
//!   one row per `(user, product)` pair
//!
//! [`CartService`] loads either backend into a [`Cart`] aggregate, joining
//! product data line by line. A line whose product has been deleted keeps
//! its place in the cart but carries no product and contributes nothing to
//! the totals.

pub mod guest;
mod service;

pub use guest::GuestCart;
pub use service::CartService;

use serde::{Deserialize, Serialize};

use dezora_luxe_core::{Amount, CartLineId, ProductId};

use crate::gateway::Product;

/// One line of the cart read model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// `None` when the product no longer exists in the catalog.
    pub product: Option<Product>,
}

impl CartLine {
    /// Line total, zero when the product is gone.
    #[must_use]
    pub fn line_total(&self) -> Amount {
        self.product
            .as_ref()
            .map_or(Amount::ZERO, |p| p.price * self.quantity)
    }
}

/// The cart aggregate handed to routes and checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Total number of units across all lines, including lines whose
    /// product is missing. This is the badge number in the header.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Sum of line totals. Lines with a missing product contribute zero.
    #[must_use]
    pub fn subtotal(&self) -> Amount {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Lines that still resolve to a catalog product.
    ///
    /// Order items are built from these, so a purged product can never
    /// appear on an order.
    #[must_use]
    pub fn valid_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter().filter(|line| line.product.is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(price: i64) -> Product {
        Product {
            id: ProductId::generate(),
            name: "Velvet Clutch".to_string(),
            category: "bags".to_string(),
            price: Amount::from_naira(price),
            stock: 10,
            images: vec![],
        }
    }

    fn line(quantity: u32, product: Option<Product>) -> CartLine {
        let product_id = product
            .as_ref()
            .map_or_else(ProductId::generate, |p| p.id);
        CartLine {
            id: CartLineId::new(product_id.as_uuid()),
            product_id,
            quantity,
            product,
        }
    }

    #[test]
    fn test_count_includes_missing_product_lines() {
        let cart = Cart {
            lines: vec![line(2, Some(product(5000))), line(3, None)],
        };
        assert_eq!(cart.count(), 5);
    }

    #[test]
    fn test_subtotal_skips_missing_product_lines() {
        let cart = Cart {
            lines: vec![line(2, Some(product(5000))), line(3, None)],
        };
        assert_eq!(cart.subtotal(), Amount::from_naira(10_000));
    }

    #[test]
    fn test_valid_lines_filters_missing_products() {
        let cart = Cart {
            lines: vec![
                line(1, Some(product(1000))),
                line(1, None),
                line(1, Some(product(2000))),
            ],
        };
        assert_eq!(cart.valid_lines().count(), 2);
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::default();
        assert!(cart.is_empty());
        assert_eq!(cart.count(), 0);
        assert_eq!(cart.subtotal(), Amount::ZERO);
    }
}
