//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//! GET  /health/ready           - Readiness check (session database)
//!
//! # Cart
//! GET  /cart                   - Cart contents
//! POST /cart/add               - Add a product
//! POST /cart/update            - Set a line's quantity
//! POST /cart/remove            - Remove a line
//! POST /cart/clear             - Empty the cart
//! GET  /cart/count             - Cart badge count
//!
//! # Checkout
//! GET  /checkout               - Current flow state
//! POST /checkout/email         - Identify stage (guests)
//! POST /checkout/shipping      - Shipping stage
//! POST /checkout/delivery      - Delivery stage
//! POST /checkout/payment       - Initialize payment, returns redirect URL
//! GET  /checkout/callback      - Return from the payment page
//! POST /checkout/cancel        - Abandon the payment attempt
//!
//! # Auth
//! POST /auth/login             - Sign in via the gateway auth provider
//! POST /auth/logout            - Sign out
//!
//! # Webhooks
//! POST /webhooks/paystack      - Payment processor notifications
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod webhooks;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tower_sessions::Session;
use tracing::warn;

use dezora_luxe_core::AnalyticsSessionId;

use crate::cart::{CartService, GuestCart};
use crate::checkout::CheckoutState;
use crate::error::AppError;
use crate::gateway::GatewayClient;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/email", post(checkout::submit_email))
        .route("/shipping", post(checkout::submit_shipping))
        .route("/delivery", post(checkout::select_delivery))
        .route("/payment", post(checkout::start_payment))
        .route("/callback", get(checkout::callback))
        .route("/cancel", post(checkout::cancel))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the webhook routes router.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/paystack", post(webhooks::paystack))
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness check: verifies the session database is reachable.
pub async fn ready(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(state.pool())
        .await
        .map_err(|e| {
            warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        })?;
    Ok("ready")
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the guest cart from the session.
///
/// Tolerant of shape drift: a value that no longer deserializes is treated
/// as an empty cart rather than a hard error.
pub(crate) async fn load_guest_cart(session: &Session) -> GuestCart {
    session
        .get::<GuestCart>(session_keys::GUEST_CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

pub(crate) async fn save_guest_cart(
    session: &Session,
    guest: &GuestCart,
) -> Result<(), AppError> {
    session.insert(session_keys::GUEST_CART, guest).await?;
    Ok(())
}

/// Load the checkout flow from the session, if one is in progress.
pub(crate) async fn load_checkout(session: &Session) -> Option<CheckoutState> {
    session
        .get::<CheckoutState>(session_keys::CHECKOUT)
        .await
        .ok()
        .flatten()
}

pub(crate) async fn save_checkout(
    session: &Session,
    flow: &CheckoutState,
) -> Result<(), AppError> {
    session.insert(session_keys::CHECKOUT, flow).await?;
    Ok(())
}

pub(crate) async fn clear_checkout(session: &Session) -> Result<(), AppError> {
    session
        .remove::<CheckoutState>(session_keys::CHECKOUT)
        .await?;
    Ok(())
}

/// The per-session analytics identifier, minted on first use.
///
/// Persisting the fresh id is best-effort; analytics must never fail a
/// request.
pub(crate) async fn analytics_session_id(session: &Session) -> AnalyticsSessionId {
    if let Ok(Some(id)) = session
        .get::<AnalyticsSessionId>(session_keys::ANALYTICS_SESSION)
        .await
    {
        return id;
    }
    let id = AnalyticsSessionId::generate();
    if let Err(e) = session
        .insert(session_keys::ANALYTICS_SESSION, &id)
        .await
    {
        warn!(error = %e, "Failed to persist analytics session id");
    }
    id
}

/// Build the per-request cart service.
pub(crate) async fn cart_service(
    state: &AppState,
    session: &Session,
    user: Option<CurrentUser>,
) -> CartService<GatewayClient> {
    let session_id = analytics_session_id(session).await;
    CartService::new(
        state.gateway().clone(),
        state.analytics().clone(),
        session_id,
        user,
    )
}
