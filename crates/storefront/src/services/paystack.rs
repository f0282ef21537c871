//! Paystack payment bridge.
//!
//! Three touchpoints with the processor:
//!
//! 1. **Initialize** - create a transaction and get back the hosted
//!    payment page URL the customer is redirected to
//! 2. **Verify** - after the customer returns to our callback URL, confirm
//!    with Paystack that the charge actually succeeded before creating the
//!    order
//! 3. **Webhook** - asynchronous `charge.success` notifications, verified
//!    with an HMAC-SHA512 signature over the raw request body

use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha512;
use thiserror::Error;
use tracing::instrument;

use dezora_luxe_core::{Amount, Email};

use crate::config::PaystackConfig;

const PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

/// Errors from the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Paystack rejected the request.
    #[error("payment API error: {0}")]
    Api(String),

    /// A verified transaction did not come back successful.
    #[error("payment {reference} not successful: {status}")]
    NotSuccessful {
        reference: String,
        status: String,
    },

    /// The configured secret key is not a valid header value.
    #[error("invalid payment key: {0}")]
    InvalidKey(String),
}

/// Every Paystack response wraps its payload in this envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

/// A freshly initialized transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSession {
    /// Hosted payment page to redirect the customer to.
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// The state of a transaction as reported by verification.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentVerification {
    pub status: String,
    pub reference: String,
    /// Amount charged, in kobo.
    pub amount: i64,
}

impl PaymentVerification {
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status == "success"
    }
}

/// Client for the Paystack transaction API.
#[derive(Clone)]
pub struct PaystackClient {
    inner: Arc<PaystackClientInner>,
}

struct PaystackClientInner {
    http: reqwest::Client,
    base_url: String,
    secret_key: SecretString,
}

impl PaystackClient {
    /// Create a new Paystack client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &PaystackConfig) -> Result<Self, PaymentError> {
        Ok(Self {
            inner: Arc::new(PaystackClientInner {
                http: reqwest::Client::builder().build()?,
                base_url: PAYSTACK_BASE_URL.to_string(),
                secret_key: config.secret_key.clone(),
            }),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.inner.secret_key.expose_secret())
    }

    fn unwrap_data<T>(response: ApiResponse<T>) -> Result<T, PaymentError> {
        if !response.status {
            return Err(PaymentError::Api(response.message));
        }
        response
            .data
            .ok_or_else(|| PaymentError::Api("response carried no data".to_string()))
    }

    /// Initialize a transaction and return the hosted payment session.
    ///
    /// Paystack bills in kobo; the amount is converted here so callers stay
    /// in naira.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Paystack rejects it.
    #[instrument(skip(self, email, metadata), fields(reference = %reference))]
    pub async fn initialize(
        &self,
        email: &Email,
        amount: Amount,
        reference: &str,
        callback_url: &str,
        metadata: serde_json::Value,
    ) -> Result<PaymentSession, PaymentError> {
        let url = format!("{}/transaction/initialize", self.inner.base_url);
        let response = self
            .inner
            .http
            .post(&url)
            .header(AUTHORIZATION, self.auth_header())
            .json(&serde_json::json!({
                "email": email.as_str(),
                "amount": amount.to_kobo(),
                "reference": reference,
                "callback_url": callback_url,
                "metadata": metadata,
            }))
            .send()
            .await?;

        let envelope: ApiResponse<PaymentSession> = response.json().await?;
        Self::unwrap_data(envelope)
    }

    /// Ask Paystack for the authoritative state of a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Paystack rejects it. A
    /// transaction that verified but did not succeed is returned as data;
    /// use [`PaymentVerification::is_successful`].
    #[instrument(skip(self), fields(reference = %reference))]
    pub async fn verify(&self, reference: &str) -> Result<PaymentVerification, PaymentError> {
        let url = format!(
            "{}/transaction/verify/{}",
            self.inner.base_url,
            urlencoding::encode(reference)
        );
        let response = self
            .inner
            .http
            .get(&url)
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        let envelope: ApiResponse<PaymentVerification> = response.json().await?;
        Self::unwrap_data(envelope)
    }
}

/// Mint a payment reference: `DZL-<millis>-<6 random digits>`.
///
/// Unique enough for a single store; Paystack additionally rejects reused
/// references on its side.
#[must_use]
pub fn generate_reference() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1_000_000);
    format!("DZL-{millis}-{suffix:06}")
}

/// Check a webhook signature.
///
/// Paystack signs the raw body with HMAC-SHA512 keyed by the secret key
/// and sends the lowercase hex digest in `x-paystack-signature`.
#[must_use]
pub fn verify_webhook_signature(secret: &SecretString, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = Hmac::<Sha512>::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    // Signatures are attacker-controlled input; compare case-insensitively
    // but over the full digest.
    signature.len() == expected.len() && signature.eq_ignore_ascii_case(&expected)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_format() {
        let reference = generate_reference();
        let pattern = regex::Regex::new(r"^DZL-\d+-\d{6}$").unwrap();
        assert!(pattern.is_match(&reference), "bad reference: {reference}");
    }

    #[test]
    fn test_references_are_unique() {
        let a = generate_reference();
        let b = generate_reference();
        assert_ne!(a, b);
    }

    #[test]
    fn test_webhook_signature_accepts_known_vector() {
        // HMAC-SHA512 test vector from RFC 4231, case 1.
        let secret = SecretString::from("\u{b}".repeat(20));
        let body = b"Hi There";
        let signature = "87aa7cdea5ef619d4ff0b4241a1d6cb02379f4e2ce4ec2787ad0b30545e17cde\
                         daa833b7d6b8a702038b274eaea3f4e4be9d914eeb61f1702e696c203a126854";
        assert!(verify_webhook_signature(&secret, body, signature));
        assert!(verify_webhook_signature(
            &secret,
            body,
            &signature.to_uppercase()
        ));
    }

    #[test]
    fn test_webhook_signature_rejects_tampering() {
        let secret = SecretString::from("sk_test_secret");
        let body = br#"{"event":"charge.success"}"#;

        let mut mac = Hmac::<Sha512>::new_from_slice(b"sk_test_secret").unwrap();
        mac.update(body);
        let good = hex::encode(mac.finalize().into_bytes());

        assert!(verify_webhook_signature(&secret, body, &good));
        assert!(!verify_webhook_signature(&secret, b"tampered body", &good));
        assert!(!verify_webhook_signature(&secret, body, "deadbeef"));
        assert!(!verify_webhook_signature(&secret, body, ""));
    }

    #[test]
    fn test_verification_success_flag() {
        let verification = PaymentVerification {
            status: "success".to_string(),
            reference: "DZL-1-000001".to_string(),
            amount: 1_480_000,
        };
        assert!(verification.is_successful());

        let failed = PaymentVerification {
            status: "failed".to_string(),
            ..verification
        };
        assert!(!failed.is_successful());
    }

    #[test]
    fn test_envelope_error_surfaces_message() {
        let envelope: ApiResponse<PaymentSession> = serde_json::from_str(
            r#"{"status":false,"message":"Invalid key"}"#,
        )
        .unwrap();
        let err = PaystackClient::unwrap_data(envelope).unwrap_err();
        assert!(matches!(err, PaymentError::Api(m) if m == "Invalid key"));
    }
}
