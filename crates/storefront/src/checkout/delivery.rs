//! Delivery methods and their flat fees.
//!
//! The catalog is fixed; fees are flat per order regardless of cart size
//! or destination (pickup aside, couriers quote nationwide flat rates).

use dezora_luxe_core::Amount;

/// One way to get an order to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryMethod {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    fee_naira: i64,
}

impl DeliveryMethod {
    #[must_use]
    pub fn fee(&self) -> Amount {
        Amount::from_naira(self.fee_naira)
    }
}

/// All delivery methods, in display order.
pub const METHODS: &[DeliveryMethod] = &[
    DeliveryMethod {
        id: "gig",
        label: "GIG Logistics",
        description: "Nationwide door delivery, 2-4 business days",
        fee_naira: 8_000,
    },
    DeliveryMethod {
        id: "guo",
        label: "GUO Logistics",
        description: "Park pickup nationwide, 3-5 business days",
        fee_naira: 4_000,
    },
    DeliveryMethod {
        id: "abuja",
        label: "Abuja Express",
        description: "Same-day delivery within Abuja",
        fee_naira: 3_000,
    },
    DeliveryMethod {
        id: "pickup",
        label: "Store Pickup",
        description: "Collect from our Wuse II boutique",
        fee_naira: 0,
    },
];

/// Look up a method by id.
#[must_use]
pub fn find(id: &str) -> Option<&'static DeliveryMethod> {
    METHODS.iter().find(|m| m.id == id)
}

/// The method preselected when the customer reaches the delivery stage.
#[must_use]
pub fn default_method() -> &'static DeliveryMethod {
    &METHODS[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_methods() {
        assert_eq!(find("gig").map(DeliveryMethod::fee), Some(Amount::from_naira(8_000)));
        assert_eq!(find("guo").map(DeliveryMethod::fee), Some(Amount::from_naira(4_000)));
        assert_eq!(find("abuja").map(DeliveryMethod::fee), Some(Amount::from_naira(3_000)));
        assert_eq!(find("pickup").map(DeliveryMethod::fee), Some(Amount::ZERO));
    }

    #[test]
    fn test_find_unknown_method() {
        assert!(find("dhl").is_none());
        assert!(find("").is_none());
    }

    #[test]
    fn test_default_is_first_listed() {
        assert_eq!(default_method().id, METHODS[0].id);
    }

    #[test]
    fn test_ids_are_unique() {
        for (i, a) in METHODS.iter().enumerate() {
            for b in &METHODS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }
}
