//! Checkout route handlers.
//!
//! The flow state lives in the session; each handler applies one
//! transition and saves the state back. Payment hands off to the hosted
//! Paystack page and resumes at `callback`.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{instrument, warn};

use dezora_luxe_core::{AddressId, Amount, OrderStatus};

use crate::cart::Cart;
use crate::checkout::{
    CheckoutState, OrderRequest, ShippingForm, Stage, Totals, create_order, delivery,
};
use crate::error::{AppError, Result};
use crate::gateway::{AnalyticsEvent, NewShippingAddress, ShippingAddress};
use crate::middleware::OptionalAuth;
use crate::models::CurrentUser;
use crate::services::{PaymentVerification, paystack};
use crate::state::AppState;

use super::{
    analytics_session_id, cart_service, clear_checkout, load_checkout, load_guest_cart,
    save_checkout, save_guest_cart,
};

/// One delivery option as shown to the customer.
#[derive(Debug, Serialize)]
pub struct DeliveryMethodView {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub fee: Amount,
    pub fee_display: String,
}

/// A saved address offered at the shipping stage.
#[derive(Debug, Serialize)]
pub struct SavedAddressView {
    pub id: AddressId,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub is_default: bool,
}

/// The whole checkout as the client sees it.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub stage: Stage,
    pub email: Option<String>,
    pub delivery_methods: Vec<DeliveryMethodView>,
    pub selected_delivery: Option<String>,
    pub saved_addresses: Vec<SavedAddressView>,
    pub totals: TotalsView,
}

/// Totals breakdown with display strings.
#[derive(Debug, Serialize)]
pub struct TotalsView {
    pub subtotal: Amount,
    pub delivery: Amount,
    pub tax: Amount,
    pub total: Amount,
    pub total_display: String,
}

impl From<Totals> for TotalsView {
    fn from(totals: Totals) -> Self {
        Self {
            subtotal: totals.subtotal,
            delivery: totals.delivery,
            tax: totals.tax,
            total: totals.total,
            total_display: totals.total.to_string(),
        }
    }
}

fn delivery_method_views() -> Vec<DeliveryMethodView> {
    delivery::METHODS
        .iter()
        .map(|m| DeliveryMethodView {
            id: m.id,
            label: m.label,
            description: m.description,
            fee: m.fee(),
            fee_display: m.fee().to_string(),
        })
        .collect()
}

/// Totals for the flow's chosen method, or the preselected default before
/// one is chosen.
fn current_totals(cart: &Cart, flow: &CheckoutState) -> Totals {
    let method = flow.delivery_method().unwrap_or_else(delivery::default_method);
    Totals::compute(cart, method)
}

async fn build_view(
    state: &AppState,
    flow: &CheckoutState,
    cart: &Cart,
    user: Option<&CurrentUser>,
) -> CheckoutView {
    // Saved addresses are a convenience; failing to load them must not
    // break the page.
    let saved_addresses = match user {
        Some(user) => match state.gateway().addresses_for(user.id).await {
            Ok(addresses) => addresses.iter().map(SavedAddressView::from).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to load saved addresses");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    CheckoutView {
        stage: flow.stage,
        email: flow.email.as_ref().map(|e| e.as_str().to_string()),
        delivery_methods: delivery_method_views(),
        selected_delivery: flow.delivery_method_id.clone(),
        saved_addresses,
        totals: current_totals(cart, flow).into(),
    }
}

impl From<&ShippingAddress> for SavedAddressView {
    fn from(a: &ShippingAddress) -> Self {
        Self {
            id: a.id,
            name: format!("{} {}", a.first_name, a.last_name),
            address: a.address.clone(),
            city: a.city.clone(),
            state: a.state.clone(),
            is_default: a.is_default,
        }
    }
}

/// `GET /checkout` - current flow state, starting one if needed.
///
/// Starting requires something in the cart; signed-in users skip the
/// identify stage.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<CheckoutView>> {
    let service = cart_service(&state, &session, user.clone()).await;
    let guest = load_guest_cart(&session).await;
    let cart = service.load(&guest).await;

    let flow = match load_checkout(&session).await {
        Some(flow) => flow,
        None => {
            if cart.valid_lines().next().is_none() {
                return Err(AppError::EmptyCart);
            }
            let flow = CheckoutState::begin(user.as_ref().map(|u| u.email.clone()));
            save_checkout(&session, &flow).await?;
            flow
        }
    };

    Ok(Json(build_view(&state, &flow, &cart, user.as_ref()).await))
}

fn require_flow(flow: Option<CheckoutState>) -> Result<CheckoutState> {
    flow.ok_or_else(|| AppError::BadRequest("no checkout in progress".to_string()))
}

/// Identify stage payload.
#[derive(Debug, Deserialize)]
pub struct EmailPayload {
    pub email: String,
}

/// `POST /checkout/email` - guests supply their email.
#[instrument(skip_all)]
pub async fn submit_email(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(payload): Json<EmailPayload>,
) -> Result<Json<CheckoutView>> {
    let mut flow = require_flow(load_checkout(&session).await)?;
    flow.submit_email(&payload.email)?;
    save_checkout(&session, &flow).await?;

    let service = cart_service(&state, &session, user.clone()).await;
    let guest = load_guest_cart(&session).await;
    let cart = service.load(&guest).await;
    Ok(Json(build_view(&state, &flow, &cart, user.as_ref()).await))
}

/// Shipping stage payload: either a saved address id or a full form.
#[derive(Debug, Deserialize)]
pub struct ShippingPayload {
    pub address_id: Option<AddressId>,
    #[serde(flatten)]
    pub form: ShippingForm,
    /// Signed-in users can save the new address for next time.
    #[serde(default)]
    pub save_address: bool,
}

/// `POST /checkout/shipping` - shipping details.
///
/// Saving the address for a signed-in user is best-effort; a save failure
/// is logged and checkout continues.
#[instrument(skip_all)]
pub async fn submit_shipping(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(payload): Json<ShippingPayload>,
) -> Result<Json<CheckoutView>> {
    let mut flow = require_flow(load_checkout(&session).await)?;

    let form = match (payload.address_id, user.as_ref()) {
        (Some(address_id), Some(user)) => saved_address_form(&state, user, address_id).await?,
        (Some(_), None) => {
            return Err(AppError::Unauthorized(
                "saved addresses require sign-in".to_string(),
            ));
        }
        (None, _) => payload.form,
    };

    let is_new_address = payload.address_id.is_none();
    flow.submit_shipping(form)?;
    save_checkout(&session, &flow).await?;

    if let (true, true, Some(user)) = (is_new_address, payload.save_address, user.as_ref()) {
        save_address_best_effort(&state, user, &flow).await;
    }

    let service = cart_service(&state, &session, user.clone()).await;
    let guest = load_guest_cart(&session).await;
    let cart = service.load(&guest).await;
    Ok(Json(build_view(&state, &flow, &cart, user.as_ref()).await))
}

async fn saved_address_form(
    state: &AppState,
    user: &CurrentUser,
    address_id: AddressId,
) -> Result<ShippingForm> {
    let addresses = state.gateway().addresses_for(user.id).await?;
    let address = addresses
        .into_iter()
        .find(|a| a.id == address_id)
        .ok_or_else(|| AppError::NotFound("address".to_string()))?;
    Ok(ShippingForm {
        first_name: address.first_name,
        last_name: address.last_name,
        phone: address.phone.unwrap_or_default(),
        address: address.address,
        city: address.city,
        state: address.state,
        zip_code: address.zip_code,
    })
}

async fn save_address_best_effort(state: &AppState, user: &CurrentUser, flow: &CheckoutState) {
    let Some(shipping) = &flow.shipping else {
        return;
    };
    // The user's first saved address becomes their default.
    let is_default = match state.gateway().addresses_for(user.id).await {
        Ok(existing) => existing.is_empty(),
        Err(e) => {
            warn!(error = %e, "Could not check existing addresses, saving as non-default");
            false
        }
    };
    let new_address = NewShippingAddress {
        user_id: user.id,
        first_name: shipping.first_name.clone(),
        last_name: shipping.last_name.clone(),
        phone: Some(shipping.phone.clone()),
        address: shipping.address.clone(),
        city: shipping.city.clone(),
        state: shipping.state.clone(),
        zip_code: shipping.zip_code.clone(),
        country: shipping.country.clone(),
        is_default,
    };
    if let Err(e) = state.gateway().insert_address(new_address).await {
        warn!(error = %e, "Failed to save shipping address, continuing checkout");
    }
}

/// Delivery stage payload.
#[derive(Debug, Deserialize)]
pub struct DeliveryPayload {
    pub method_id: String,
}

/// `POST /checkout/delivery` - pick a delivery method.
#[instrument(skip_all)]
pub async fn select_delivery(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(payload): Json<DeliveryPayload>,
) -> Result<Json<CheckoutView>> {
    let mut flow = require_flow(load_checkout(&session).await)?;
    flow.select_delivery(&payload.method_id)?;
    save_checkout(&session, &flow).await?;

    let service = cart_service(&state, &session, user.clone()).await;
    let guest = load_guest_cart(&session).await;
    let cart = service.load(&guest).await;
    Ok(Json(build_view(&state, &flow, &cart, user.as_ref()).await))
}

/// Payment handoff data.
#[derive(Debug, Serialize)]
pub struct PaymentView {
    /// Hosted payment page to redirect the customer to.
    pub authorization_url: String,
    pub reference: String,
    pub total: Amount,
}

/// `POST /checkout/payment` - initialize the transaction.
///
/// Totals are recomputed from the live cart here, so a cart edited in
/// another tab is charged at its current contents.
#[instrument(skip_all)]
pub async fn start_payment(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<PaymentView>> {
    let mut flow = require_flow(load_checkout(&session).await)?;
    if flow.stage != Stage::Payment {
        return Err(AppError::BadRequest(format!(
            "checkout is at the {} stage",
            flow.stage.as_str()
        )));
    }
    let email = flow
        .email
        .clone()
        .ok_or_else(|| AppError::BadRequest("checkout has no email".to_string()))?;
    let method = flow
        .delivery_method()
        .ok_or_else(|| AppError::BadRequest("no delivery method chosen".to_string()))?;

    let service = cart_service(&state, &session, user.clone()).await;
    let guest = load_guest_cart(&session).await;
    let cart = service.load(&guest).await;
    if cart.valid_lines().next().is_none() {
        return Err(AppError::EmptyCart);
    }

    let totals = Totals::compute(&cart, method);
    let reference = paystack::generate_reference();
    let callback_url = format!("{}/checkout/callback", state.config().base_url);

    let metadata = serde_json::json!({
        "custom_fields": [
            {
                "display_name": "Delivery",
                "variable_name": "delivery_method",
                "value": method.label,
            },
            {
                "display_name": "Items",
                "variable_name": "item_count",
                "value": cart.count().to_string(),
            },
        ],
    });

    let payment = state
        .paystack()
        .initialize(&email, totals.total, &reference, &callback_url, metadata)
        .await?;

    flow.payment_reference = Some(payment.reference.clone());
    save_checkout(&session, &flow).await?;

    Ok(Json(PaymentView {
        authorization_url: payment.authorization_url,
        reference: payment.reference,
        total: totals.total,
    }))
}

/// Query parameters Paystack appends on the way back.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub reference: Option<String>,
    pub trxref: Option<String>,
}

/// Order confirmation payload.
#[derive(Debug, Serialize)]
pub struct ConfirmationView {
    pub order_number: String,
    pub status: OrderStatus,
    pub total: Amount,
    pub total_display: String,
}

/// `GET /checkout/callback` - back from the payment page.
///
/// Verifies the transaction with Paystack before anything else. Success
/// creates the order and clears the cart; anything else resets the payment
/// stage so the customer can retry.
#[instrument(skip(state, session, user))]
pub async fn callback(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<Json<ConfirmationView>> {
    let reference = params
        .reference
        .or(params.trxref)
        .ok_or_else(|| AppError::BadRequest("missing payment reference".to_string()))?;

    let mut flow = require_flow(load_checkout(&session).await)?;
    if flow.payment_reference.as_deref() != Some(reference.as_str()) {
        return Err(AppError::BadRequest("unknown payment reference".to_string()));
    }

    let verification = state.paystack().verify(&reference).await?;
    if !verification.is_successful() {
        flow.payment_cancelled();
        save_checkout(&session, &flow).await?;
        return Err(AppError::BadRequest(format!(
            "payment {}: {}",
            reference, verification.status
        )));
    }

    let method = flow
        .delivery_method()
        .ok_or_else(|| AppError::BadRequest("no delivery method chosen".to_string()))?;
    let shipping = flow
        .shipping
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("no shipping details".to_string()))?;

    let service = cart_service(&state, &session, user.clone()).await;
    let mut guest = load_guest_cart(&session).await;
    let cart = service.load(&guest).await;
    let totals = Totals::compute(&cart, method);

    // Paystack is authoritative for what was charged. A cart edited in
    // another tab between initialize and callback changes the total; the
    // order must never be written against a different amount.
    if !charged_amount_matches(&verification, totals.total) {
        flow.payment_cancelled();
        save_checkout(&session, &flow).await?;
        return Err(AppError::BadRequest(format!(
            "charged amount no longer matches the cart for {reference}"
        )));
    }

    let order = create_order(
        state.gateway(),
        OrderRequest {
            cart: &cart,
            user: user.as_ref().map(|u| u.id),
            total: totals.total,
            shipping_address: shipping.snapshot(),
            payment_reference: reference.clone(),
            delivery_method: method.label.to_string(),
        },
    )
    .await?;

    // Order exists; from here on everything is cleanup.
    if let Err(e) = service.clear(&mut guest).await {
        warn!(error = %e, "Failed to clear cart after order");
    }
    save_guest_cart(&session, &guest).await?;
    clear_checkout(&session).await?;

    state.analytics().track(AnalyticsEvent {
        event_name: "purchase".to_string(),
        session_id: analytics_session_id(&session).await.as_str().to_string(),
        user_id: user.as_ref().map(|u| u.id),
        product_id: None,
        order_id: Some(order.id),
        path: None,
        metadata: serde_json::json!({
            "order_number": order.order_number,
            "total": totals.total,
        }),
    });

    Ok(Json(ConfirmationView {
        order_number: order.order_number,
        status: order.status,
        total: order.total_amount,
        total_display: order.total_amount.to_string(),
    }))
}

/// `POST /checkout/cancel` - abandon the payment attempt.
///
/// The flow stays at the payment stage and the cart is untouched.
#[instrument(skip_all)]
pub async fn cancel(session: Session) -> Result<Json<serde_json::Value>> {
    let mut flow = require_flow(load_checkout(&session).await)?;
    flow.payment_cancelled();
    save_checkout(&session, &flow).await?;
    Ok(Json(serde_json::json!({ "stage": flow.stage.as_str() })))
}

/// Whether the verified charge equals the order total. Paystack reports
/// amounts in kobo.
fn charged_amount_matches(verification: &PaymentVerification, total: Amount) -> bool {
    verification.amount == total.to_kobo()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified(amount: i64) -> PaymentVerification {
        PaymentVerification {
            status: "success".to_string(),
            reference: "DZL-1-000001".to_string(),
            amount,
        }
    }

    #[test]
    fn test_charged_amount_compared_in_kobo() {
        assert!(charged_amount_matches(
            &verified(1_480_000),
            Amount::from_naira(14_800)
        ));
    }

    #[test]
    fn test_cart_edited_after_payment_is_detected() {
        // Charged ₦14,800 but the live cart now totals ₦18,800.
        assert!(!charged_amount_matches(
            &verified(1_480_000),
            Amount::from_naira(18_800)
        ));
        assert!(!charged_amount_matches(&verified(0), Amount::from_naira(14_800)));
    }
}
