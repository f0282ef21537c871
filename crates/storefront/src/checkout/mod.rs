//! Checkout.
//!
//! A four-stage flow held in the session:
//!
//! 1. **Identify** - guests supply an email; signed-in users skip this
//! 2. **Shipping** - delivery address, validated field by field
//! 3. **Delivery** - pick one of the fixed delivery methods
//! 4. **Payment** - redirect to the hosted payment page, then back
//!
//! Stage transitions are enforced by [`CheckoutState`]; totals are pure
//! arithmetic over the cart in [`totals`]; order persistence lives in
//! [`order`].

pub mod delivery;
pub mod flow;
pub mod order;
pub mod totals;

pub use delivery::DeliveryMethod;
pub use flow::{CheckoutError, CheckoutState, ShippingForm, Stage};
pub use order::{OrderError, OrderRequest, create_order};
pub use totals::{TAX_RATE, Totals};
