//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::gateway::{GatewayClient, GatewayError};
use crate::services::{AnalyticsSink, PaymentError, PaystackClient};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("gateway client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the gateway client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    gateway: GatewayClient,
    paystack: PaystackClient,
    analytics: AnalyticsSink,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway or payment client cannot be built
    /// from the configuration.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let gateway = GatewayClient::new(&config.gateway)?;
        let paystack = PaystackClient::new(&config.paystack)?;
        let analytics = AnalyticsSink::new(gateway.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gateway,
                paystack,
                analytics,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the session database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the data gateway client.
    #[must_use]
    pub fn gateway(&self) -> &GatewayClient {
        &self.inner.gateway
    }

    /// Get a reference to the Paystack client.
    #[must_use]
    pub fn paystack(&self) -> &PaystackClient {
        &self.inner.paystack
    }

    /// Get a reference to the analytics sink.
    #[must_use]
    pub fn analytics(&self) -> &AnalyticsSink {
        &self.inner.analytics
    }
}
