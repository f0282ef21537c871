//! Order total arithmetic.

use rust_decimal::Decimal;
use serde::Serialize;

use dezora_luxe_core::Amount;

use crate::cart::Cart;

use super::delivery::DeliveryMethod;

/// VAT applied to the merchandise subtotal. Delivery is not taxed.
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// The checkout total breakdown shown to the customer and charged at
/// payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Amount,
    pub delivery: Amount,
    pub tax: Amount,
    pub total: Amount,
}

impl Totals {
    /// Compute totals for a cart and chosen delivery method.
    ///
    /// Lines whose product is missing contribute nothing to the subtotal,
    /// matching what the cart page shows.
    #[must_use]
    pub fn compute(cart: &Cart, delivery: &DeliveryMethod) -> Self {
        let subtotal = cart.subtotal();
        let fee = delivery.fee();
        let tax = subtotal * TAX_RATE;
        Self {
            subtotal,
            delivery: fee,
            tax,
            total: subtotal + fee + tax,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dezora_luxe_core::{CartLineId, ProductId};

    use crate::cart::CartLine;
    use crate::checkout::delivery;
    use crate::gateway::Product;

    use super::*;

    fn cart_with(prices_and_quantities: &[(i64, u32)]) -> Cart {
        let lines = prices_and_quantities
            .iter()
            .map(|&(price, quantity)| {
                let id = ProductId::generate();
                CartLine {
                    id: CartLineId::new(id.as_uuid()),
                    product_id: id,
                    quantity,
                    product: Some(Product {
                        id,
                        name: "Gold Cuff".to_string(),
                        category: "jewellery".to_string(),
                        price: Amount::from_naira(price),
                        stock: 3,
                        images: vec![],
                    }),
                }
            })
            .collect();
        Cart { lines }
    }

    #[test]
    fn test_totals_with_courier_delivery() {
        // 10,000 subtotal + 4,000 delivery + 800 tax = 14,800
        let cart = cart_with(&[(10_000, 1)]);
        let totals = Totals::compute(&cart, delivery::find("guo").unwrap());

        assert_eq!(totals.subtotal, Amount::from_naira(10_000));
        assert_eq!(totals.delivery, Amount::from_naira(4_000));
        assert_eq!(totals.tax, Amount::from_naira(800));
        assert_eq!(totals.total, Amount::from_naira(14_800));
    }

    #[test]
    fn test_tax_applies_to_subtotal_only() {
        let cart = cart_with(&[(10_000, 1)]);
        let with_pickup = Totals::compute(&cart, delivery::find("pickup").unwrap());
        let with_gig = Totals::compute(&cart, delivery::find("gig").unwrap());

        assert_eq!(with_pickup.tax, with_gig.tax);
        assert_eq!(with_pickup.total, Amount::from_naira(10_800));
        assert_eq!(with_gig.total, Amount::from_naira(18_800));
    }

    #[test]
    fn test_quantities_multiply_into_subtotal() {
        let cart = cart_with(&[(2_500, 4), (5_000, 2)]);
        let totals = Totals::compute(&cart, delivery::find("pickup").unwrap());

        assert_eq!(totals.subtotal, Amount::from_naira(20_000));
        assert_eq!(totals.tax, Amount::from_naira(1_600));
    }

    #[test]
    fn test_missing_product_lines_do_not_inflate_total() {
        let mut cart = cart_with(&[(10_000, 1)]);
        let orphan = ProductId::generate();
        cart.lines.push(CartLine {
            id: CartLineId::new(orphan.as_uuid()),
            product_id: orphan,
            quantity: 7,
            product: None,
        });

        let totals = Totals::compute(&cart, delivery::find("pickup").unwrap());
        assert_eq!(totals.subtotal, Amount::from_naira(10_000));
        assert_eq!(totals.total, Amount::from_naira(10_800));
    }

    #[test]
    fn test_empty_cart_totals() {
        let totals = Totals::compute(&Cart::default(), delivery::find("pickup").unwrap());
        assert_eq!(totals.total, Amount::ZERO);
    }
}
