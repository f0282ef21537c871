//! What the storefront keeps in the session.

use serde::{Deserialize, Serialize};

use dezora_luxe_core::{Email, UserId};

/// Session keys. All storefront session state lives under these.
pub mod session_keys {
    /// [`super::CurrentUser`], present when signed in.
    pub const CURRENT_USER: &str = "current_user";
    /// [`crate::cart::GuestCart`].
    pub const GUEST_CART: &str = "guest_cart";
    /// [`crate::checkout::CheckoutState`], present mid-checkout.
    pub const CHECKOUT: &str = "checkout";
    /// `AnalyticsSessionId`, minted on first use.
    pub const ANALYTICS_SESSION: &str = "analytics_session";
}

/// The signed-in user, as stored in the session after a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
}
