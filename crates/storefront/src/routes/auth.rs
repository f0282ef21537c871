//! Auth route handlers.
//!
//! Credentials are checked by the gateway's hosted auth provider; this
//! service only keeps the resulting user in the session. Signing in also
//! merges the guest cart into the user's server cart.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{instrument, warn};

use dezora_luxe_core::Email;

use crate::error::{AppError, Result};
use crate::gateway::GatewayError;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

use super::{cart_service, load_guest_cart, save_guest_cart};

/// Login payload.
#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

/// The signed-in user as returned to the client.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub email: String,
}

/// `POST /auth/login` - sign in and merge the guest cart.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<UserView>> {
    let email = Email::parse(&payload.email)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let auth_user = state
        .gateway()
        .sign_in(&email, &payload.password)
        .await
        .map_err(|e| match e {
            GatewayError::Api { .. } => {
                AppError::Unauthorized("invalid credentials".to_string())
            }
            other => AppError::Gateway(other),
        })?;

    let user = CurrentUser {
        id: auth_user.id,
        email: Email::parse(&auth_user.email)
            .map_err(|e| AppError::Internal(format!("auth provider email: {e}")))?,
    };

    // New identity, new session id.
    session.cycle_id().await?;
    set_current_user(&session, &user).await?;

    // Best-effort: a failed merge must not fail the login.
    let mut guest = load_guest_cart(&session).await;
    if !guest.is_empty() {
        let service = cart_service(&state, &session, Some(user.clone())).await;
        service.sync_guest_cart(&mut guest, user.id).await;
        if let Err(e) = save_guest_cart(&session, &guest).await {
            warn!(error = %e, "Failed to persist merged guest cart");
        }
    }

    Ok(Json(UserView {
        email: user.email.as_str().to_string(),
    }))
}

/// `POST /auth/logout` - sign out.
///
/// The session itself survives, so the (now empty) guest cart and any
/// in-flight checkout are dropped with the user context.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Json<serde_json::Value>> {
    clear_current_user(&session).await?;
    super::clear_checkout(&session).await?;
    Ok(Json(serde_json::json!({ "signed_out": true })))
}
