//! Cart route handlers.
//!
//! Every handler works for guests and signed-in users alike: the cart
//! service picks the backend, and the handlers only deal in line ids.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use dezora_luxe_core::{Amount, CartLineId, ProductId};

use crate::cart::{Cart, CartLine};
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

use super::{cart_service, load_guest_cart, save_guest_cart};

/// Cart line display data.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Absent when the product has been removed from the catalog.
    pub name: Option<String>,
    pub unit_price: Option<Amount>,
    pub line_total: Amount,
    pub image: Option<String>,
    pub available: bool,
}

/// Cart display data.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub count: u32,
    pub subtotal: Amount,
    pub subtotal_display: String,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            quantity: line.quantity,
            name: line.product.as_ref().map(|p| p.name.clone()),
            unit_price: line.product.as_ref().map(|p| p.price),
            line_total: line.line_total(),
            image: line
                .product
                .as_ref()
                .and_then(|p| p.images.first().cloned()),
            available: line.product.is_some(),
        }
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        let subtotal = cart.subtotal();
        Self {
            lines: cart.lines.iter().map(CartLineView::from).collect(),
            count: cart.count(),
            subtotal,
            subtotal_display: subtotal.to_string(),
        }
    }
}

/// Add to cart payload.
#[derive(Debug, Deserialize)]
pub struct AddToCartPayload {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
}

/// Update quantity payload.
#[derive(Debug, Deserialize)]
pub struct UpdateCartPayload {
    pub line_id: CartLineId,
    pub quantity: u32,
}

/// Remove line payload.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartPayload {
    pub line_id: CartLineId,
}

/// Cart badge data.
#[derive(Debug, Serialize)]
pub struct CartCountView {
    pub count: u32,
}

/// `GET /cart` - the full cart.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<CartView>> {
    let service = cart_service(&state, &session, user).await;
    let guest = load_guest_cart(&session).await;
    let cart = service.load(&guest).await;
    Ok(Json(CartView::from(&cart)))
}

/// `POST /cart/add` - add a product, returning the new badge count.
#[instrument(skip(state, session), fields(product_id = %payload.product_id))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(payload): Json<AddToCartPayload>,
) -> Result<Json<CartCountView>> {
    let quantity = payload.quantity.unwrap_or(1).max(1);
    let service = cart_service(&state, &session, user).await;
    let mut guest = load_guest_cart(&session).await;

    service.add(&mut guest, payload.product_id, quantity).await?;
    save_guest_cart(&session, &guest).await?;

    let cart = service.load(&guest).await;
    Ok(Json(CartCountView { count: cart.count() }))
}

/// `POST /cart/update` - set a line's quantity (zero removes it).
#[instrument(skip(state, session), fields(line_id = %payload.line_id))]
pub async fn update(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(payload): Json<UpdateCartPayload>,
) -> Result<Json<CartView>> {
    let service = cart_service(&state, &session, user).await;
    let mut guest = load_guest_cart(&session).await;

    service
        .update_quantity(&mut guest, payload.line_id, payload.quantity)
        .await?;
    save_guest_cart(&session, &guest).await?;

    let cart = service.load(&guest).await;
    Ok(Json(CartView::from(&cart)))
}

/// `POST /cart/remove` - drop a line.
#[instrument(skip(state, session), fields(line_id = %payload.line_id))]
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(payload): Json<RemoveFromCartPayload>,
) -> Result<Json<CartView>> {
    let service = cart_service(&state, &session, user).await;
    let mut guest = load_guest_cart(&session).await;

    service.remove(&mut guest, payload.line_id).await?;
    save_guest_cart(&session, &guest).await?;

    let cart = service.load(&guest).await;
    Ok(Json(CartView::from(&cart)))
}

/// `POST /cart/clear` - empty the cart.
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<CartCountView>> {
    let service = cart_service(&state, &session, user).await;
    let mut guest = load_guest_cart(&session).await;

    service.clear(&mut guest).await?;
    save_guest_cart(&session, &guest).await?;

    Ok(Json(CartCountView { count: 0 }))
}

/// `GET /cart/count` - the badge count alone.
#[instrument(skip_all)]
pub async fn count(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<CartCountView>> {
    let service = cart_service(&state, &session, user).await;
    let guest = load_guest_cart(&session).await;
    let cart = service.load(&guest).await;
    Ok(Json(CartCountView { count: cart.count() }))
}
