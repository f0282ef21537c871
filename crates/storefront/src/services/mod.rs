//! External service clients.

pub mod analytics;
pub mod paystack;

pub use analytics::AnalyticsSink;
pub use paystack::{PaymentError, PaymentSession, PaymentVerification, PaystackClient};
