//! The checkout state machine.
//!
//! Lives in the session between requests. Each submit handler calls the
//! matching transition; a submit against the wrong stage is rejected
//! rather than silently reordered, so a stale tab cannot skip validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dezora_luxe_core::{Email, EmailError};

use crate::gateway::AddressSnapshot;

use super::delivery;

/// Where the customer is in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Identify,
    Shipping,
    Delivery,
    Payment,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identify => "identify",
            Self::Shipping => "shipping",
            Self::Delivery => "delivery",
            Self::Payment => "payment",
        }
    }
}

/// Errors from checkout transitions.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A submit arrived for a stage the flow is not at.
    #[error("checkout is at the {actual} stage, not {expected}")]
    WrongStage {
        expected: &'static str,
        actual: &'static str,
    },

    /// A required shipping field was blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The supplied email did not parse.
    #[error(transparent)]
    InvalidEmail(#[from] EmailError),

    /// The delivery method id matched nothing in the catalog.
    #[error("unknown delivery method: {0}")]
    UnknownDeliveryMethod(String),
}

/// The shipping form as submitted. Everything arrives as strings and is
/// validated in [`CheckoutState::submit_shipping`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
}

/// Validated shipping details held by the flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl ShippingDetails {
    /// Freeze these details into the snapshot stored on the order.
    #[must_use]
    pub fn snapshot(&self) -> AddressSnapshot {
        AddressSnapshot {
            name: format!("{} {}", self.first_name, self.last_name),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip_code: self.zip_code.clone(),
            country: self.country.clone(),
        }
    }
}

/// The whole checkout flow, serialized into the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutState {
    pub stage: Stage,
    pub email: Option<Email>,
    pub shipping: Option<ShippingDetails>,
    pub delivery_method_id: Option<String>,
    /// Set once payment is initialized; cleared when the customer cancels.
    pub payment_reference: Option<String>,
}

impl CheckoutState {
    /// Start a checkout. A signed-in user's email is known, so they skip
    /// straight to shipping.
    #[must_use]
    pub fn begin(user_email: Option<Email>) -> Self {
        let stage = if user_email.is_some() {
            Stage::Shipping
        } else {
            Stage::Identify
        };
        Self {
            stage,
            email: user_email,
            shipping: None,
            delivery_method_id: None,
            payment_reference: None,
        }
    }

    fn expect_stage(&self, expected: Stage) -> Result<(), CheckoutError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(CheckoutError::WrongStage {
                expected: expected.as_str(),
                actual: self.stage.as_str(),
            })
        }
    }

    /// Identify stage: accept the guest's email and move to shipping.
    ///
    /// # Errors
    ///
    /// Rejects out-of-stage submits and unparseable emails.
    pub fn submit_email(&mut self, raw: &str) -> Result<(), CheckoutError> {
        self.expect_stage(Stage::Identify)?;
        self.email = Some(Email::parse(raw.trim())?);
        self.stage = Stage::Shipping;
        Ok(())
    }

    /// Shipping stage: validate the address form and move to delivery.
    ///
    /// Zip code is optional; everything else is required. Country is fixed,
    /// the store only ships domestically.
    ///
    /// # Errors
    ///
    /// Rejects out-of-stage submits and blank required fields.
    pub fn submit_shipping(&mut self, form: ShippingForm) -> Result<(), CheckoutError> {
        self.expect_stage(Stage::Shipping)?;

        let required = [
            ("first_name", &form.first_name),
            ("last_name", &form.last_name),
            ("phone", &form.phone),
            ("address", &form.address),
            ("city", &form.city),
            ("state", &form.state),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(CheckoutError::MissingField(name));
            }
        }

        self.shipping = Some(ShippingDetails {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            phone: form.phone.trim().to_string(),
            address: form.address.trim().to_string(),
            city: form.city.trim().to_string(),
            state: form.state.trim().to_string(),
            zip_code: form.zip_code.trim().to_string(),
            country: "Nigeria".to_string(),
        });
        self.stage = Stage::Delivery;
        Ok(())
    }

    /// Delivery stage: pick a method and move to payment.
    ///
    /// # Errors
    ///
    /// Rejects out-of-stage submits and ids not in the delivery catalog.
    pub fn select_delivery(&mut self, method_id: &str) -> Result<(), CheckoutError> {
        self.expect_stage(Stage::Delivery)?;
        let method = delivery::find(method_id)
            .ok_or_else(|| CheckoutError::UnknownDeliveryMethod(method_id.to_string()))?;
        self.delivery_method_id = Some(method.id.to_string());
        self.stage = Stage::Payment;
        Ok(())
    }

    /// The customer backed out of the hosted payment page. The flow stays
    /// at payment with the stale reference dropped, ready to retry.
    pub fn payment_cancelled(&mut self) {
        self.payment_reference = None;
    }

    /// Step back one stage, keeping everything already entered.
    pub fn back(&mut self) {
        self.stage = match self.stage {
            Stage::Identify | Stage::Shipping => Stage::Identify,
            Stage::Delivery => Stage::Shipping,
            Stage::Payment => Stage::Delivery,
        };
        if self.stage != Stage::Payment {
            self.payment_reference = None;
        }
    }

    /// The chosen delivery method, if the flow has reached payment.
    #[must_use]
    pub fn delivery_method(&self) -> Option<&'static delivery::DeliveryMethod> {
        self.delivery_method_id.as_deref().and_then(delivery::find)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_form() -> ShippingForm {
        ShippingForm {
            first_name: "Ada".to_string(),
            last_name: "Obi".to_string(),
            phone: "+2348012345678".to_string(),
            address: "1 Marina Rd".to_string(),
            city: "Abuja".to_string(),
            state: "FCT".to_string(),
            zip_code: String::new(),
        }
    }

    #[test]
    fn test_guest_walks_all_four_stages() {
        let mut flow = CheckoutState::begin(None);
        assert_eq!(flow.stage, Stage::Identify);

        flow.submit_email("ada@dezora.example").unwrap();
        assert_eq!(flow.stage, Stage::Shipping);

        flow.submit_shipping(valid_form()).unwrap();
        assert_eq!(flow.stage, Stage::Delivery);

        flow.select_delivery("guo").unwrap();
        assert_eq!(flow.stage, Stage::Payment);
        assert_eq!(flow.delivery_method().unwrap().id, "guo");
    }

    #[test]
    fn test_signed_in_user_skips_identify() {
        let email = Email::parse("ada@dezora.example").unwrap();
        let flow = CheckoutState::begin(Some(email.clone()));
        assert_eq!(flow.stage, Stage::Shipping);
        assert_eq!(flow.email, Some(email));
    }

    #[test]
    fn test_out_of_stage_submit_is_rejected() {
        let mut flow = CheckoutState::begin(None);
        let err = flow.submit_shipping(valid_form()).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::WrongStage {
                expected: "shipping",
                actual: "identify"
            }
        ));

        let err = flow.select_delivery("guo").unwrap_err();
        assert!(matches!(err, CheckoutError::WrongStage { .. }));
    }

    #[test]
    fn test_blank_required_field_names_the_field() {
        let mut flow = CheckoutState::begin(Some(Email::parse("a@b.c").unwrap()));
        let form = ShippingForm {
            city: "   ".to_string(),
            ..valid_form()
        };
        let err = flow.submit_shipping(form).unwrap_err();
        assert!(matches!(err, CheckoutError::MissingField("city")));
        assert_eq!(flow.stage, Stage::Shipping);
    }

    #[test]
    fn test_zip_code_is_optional() {
        let mut flow = CheckoutState::begin(Some(Email::parse("a@b.c").unwrap()));
        flow.submit_shipping(valid_form()).unwrap();
        assert_eq!(flow.shipping.unwrap().zip_code, "");
    }

    #[test]
    fn test_bad_email_keeps_identify_stage() {
        let mut flow = CheckoutState::begin(None);
        assert!(flow.submit_email("not-an-email").is_err());
        assert_eq!(flow.stage, Stage::Identify);
    }

    #[test]
    fn test_unknown_delivery_method_rejected() {
        let mut flow = CheckoutState::begin(Some(Email::parse("a@b.c").unwrap()));
        flow.submit_shipping(valid_form()).unwrap();
        let err = flow.select_delivery("teleport").unwrap_err();
        assert!(matches!(err, CheckoutError::UnknownDeliveryMethod(id) if id == "teleport"));
        assert_eq!(flow.stage, Stage::Delivery);
    }

    #[test]
    fn test_cancel_stays_at_payment_and_drops_reference() {
        let mut flow = CheckoutState::begin(Some(Email::parse("a@b.c").unwrap()));
        flow.submit_shipping(valid_form()).unwrap();
        flow.select_delivery("pickup").unwrap();
        flow.payment_reference = Some("DZL-1-000001".to_string());

        flow.payment_cancelled();
        assert_eq!(flow.stage, Stage::Payment);
        assert!(flow.payment_reference.is_none());
    }

    #[test]
    fn test_back_preserves_entered_data() {
        let mut flow = CheckoutState::begin(None);
        flow.submit_email("ada@dezora.example").unwrap();
        flow.submit_shipping(valid_form()).unwrap();
        flow.back();

        assert_eq!(flow.stage, Stage::Shipping);
        assert!(flow.email.is_some());
        assert!(flow.shipping.is_some());
    }

    #[test]
    fn test_snapshot_joins_name() {
        let mut flow = CheckoutState::begin(Some(Email::parse("a@b.c").unwrap()));
        flow.submit_shipping(valid_form()).unwrap();
        let snapshot = flow.shipping.unwrap().snapshot();
        assert_eq!(snapshot.name, "Ada Obi");
        assert_eq!(snapshot.country, "Nigeria");
    }
}
