//! Webhook route handlers.
//!
//! Paystack notifies asynchronously in addition to the browser callback,
//! so a customer who closes the tab after paying still gets their order
//! moved along. The signature covers the raw body; parse only after it
//! checks out.

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    extract::State,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::state::AppState;

/// Header carrying the HMAC-SHA512 signature.
const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// The subset of the webhook envelope we act on.
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    reference: String,
}

/// `POST /webhooks/paystack` - payment processor notifications.
///
/// Only `charge.success` is acted on: the matching pending order becomes
/// `processing`. Every verified event is acknowledged with 200 so Paystack
/// stops retrying; a bad signature gets 401.
#[instrument(skip_all)]
pub async fn paystack(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        warn!("Webhook missing signature header");
        return StatusCode::UNAUTHORIZED;
    };

    let secret = &state.config().paystack.secret_key;
    if !crate::services::paystack::verify_webhook_signature(secret, &body, signature) {
        warn!("Webhook signature verification failed");
        return StatusCode::UNAUTHORIZED;
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Unparseable webhook body");
            return StatusCode::BAD_REQUEST;
        }
    };

    match envelope.event.as_str() {
        "charge.success" => {
            info!(reference = %envelope.data.reference, "Payment confirmed via webhook");
            if let Err(e) = state
                .gateway()
                .mark_order_processing(&envelope.data.reference)
                .await
            {
                // Tell Paystack to retry.
                error!(
                    reference = %envelope.data.reference,
                    error = %e,
                    "Failed to update order from webhook"
                );
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
            StatusCode::OK
        }
        other => {
            info!(event = %other, "Ignoring webhook event");
            StatusCode::OK
        }
    }
}
