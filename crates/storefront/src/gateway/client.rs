//! HTTP client for the hosted data platform.
//!
//! The platform exposes PostgREST-style table endpoints under `/rest/v1`,
//! remote procedures under `/rest/v1/rpc`, and a password-grant token
//! endpoint under `/auth/v1`. Every non-2xx response carries a structured
//! `{ code, message }` body that we surface as [`GatewayError::Api`].

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde::ser::Serialize;
use tracing::{debug, instrument};

use dezora_luxe_core::{CartLineId, Email, ProductId, UserId};

use crate::config::GatewayConfig;

use super::types::{
    AnalyticsEvent, AuthUser, CartItemRow, NewOrder, NewOrderItem, NewShippingAddress, OrderRow,
    Product, ShippingAddress,
};
use super::{GatewayError, OrderStore, ProductCatalog, ServerCartStore};

/// Product cache TTL. Prices and stock tolerate five minutes of staleness.
const PRODUCT_CACHE_TTL: Duration = Duration::from_secs(300);
const PRODUCT_CACHE_CAPACITY: u64 = 1000;

// =============================================================================
// GatewayClient
// =============================================================================

/// Client for the remote data gateway.
///
/// Cheaply cloneable; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<GatewayClientInner>,
}

struct GatewayClientInner {
    http: reqwest::Client,
    rest_url: String,
    auth_url: String,
    product_cache: Cache<ProductId, Product>,
}

/// Structured error body returned by the platform.
///
/// Table endpoints use `{ code, message }`; the auth endpoint uses
/// `{ error, error_description }`. Both are tolerated.
#[derive(Debug, Deserialize, Default)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl GatewayClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns an error if the service key is not a valid header value or
    /// the HTTP client fails to build.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let key = config.service_key.expose_secret();

        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(key)
            .map_err(|e| GatewayError::InvalidKey(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| GatewayError::InvalidKey(e.to_string()))?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        let base = config.url.trim_end_matches('/');
        let product_cache = Cache::builder()
            .max_capacity(PRODUCT_CACHE_CAPACITY)
            .time_to_live(PRODUCT_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(GatewayClientInner {
                http,
                rest_url: format!("{base}/rest/v1"),
                auth_url: format!("{base}/auth/v1"),
                product_cache,
            }),
        })
    }

    /// Map a non-success response to a structured gateway error.
    async fn error_from(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();

        let code = parsed
            .code
            .or(parsed.error)
            .unwrap_or_else(|| status.as_u16().to_string());
        let message = parsed
            .message
            .or(parsed.error_description)
            .unwrap_or_else(|| body.chars().take(200).collect());

        GatewayError::Api { code, message }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    /// GET rows from a table endpoint.
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, GatewayError> {
        let url = format!("{}/{table}?{query}", self.inner.rest_url);
        let response = self.inner.http.get(&url).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// POST rows and get the stored representation back.
    async fn insert_returning<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: &str,
        query: &str,
        prefer: &str,
        body: &B,
    ) -> Result<Vec<T>, GatewayError> {
        let url = if query.is_empty() {
            format!("{}/{table}", self.inner.rest_url)
        } else {
            format!("{}/{table}?{query}", self.inner.rest_url)
        };
        let response = self
            .inner
            .http
            .post(&url)
            .header("Prefer", prefer)
            .json(body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// POST rows without reading the representation back.
    async fn insert<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/{table}", self.inner.rest_url);
        let response = self.inner.http.post(&url).json(body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// PATCH rows matching a filter.
    async fn update<B: Serialize + ?Sized>(
        &self,
        table: &str,
        query: &str,
        body: &B,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/{table}?{query}", self.inner.rest_url);
        let response = self.inner.http.patch(&url).json(body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// DELETE rows matching a filter.
    async fn delete(&self, table: &str, query: &str) -> Result<(), GatewayError> {
        let url = format!("{}/{table}?{query}", self.inner.rest_url);
        let response = self.inner.http.delete(&url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    fn first_row<T>(rows: Vec<T>, what: &str) -> Result<T, GatewayError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound(format!("{what}: gateway returned no rows")))
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Fetch a product by id, consulting the cache first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails. A missing product is
    /// `Ok(None)`, not an error - cart lines must tolerate deleted products.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, GatewayError> {
        if let Some(product) = self.inner.product_cache.get(&id).await {
            debug!("Cache hit for product");
            return Ok(Some(product));
        }

        let rows: Vec<Product> = self.select("products", &format!("id=eq.{id}&select=*")).await?;
        let product = rows.into_iter().next();

        if let Some(p) = &product {
            self.inner.product_cache.insert(id, p.clone()).await;
        }

        Ok(product)
    }

    // =========================================================================
    // Shipping addresses
    // =========================================================================

    /// All saved addresses for a user, default first, then newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn addresses_for(&self, user: UserId) -> Result<Vec<ShippingAddress>, GatewayError> {
        self.select(
            "shipping_addresses",
            &format!("user_id=eq.{user}&order=is_default.desc,created_at.desc"),
        )
        .await
    }

    /// Persist a new shipping address and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails; a duplicate-key conflict
    /// surfaces as `GatewayError::Api` with `is_unique_violation()`.
    #[instrument(skip(self, address), fields(user_id = %address.user_id))]
    pub async fn insert_address(
        &self,
        address: NewShippingAddress,
    ) -> Result<ShippingAddress, GatewayError> {
        let rows = self
            .insert_returning(
                "shipping_addresses",
                "",
                "return=representation",
                &address,
            )
            .await?;
        Self::first_row(rows, "shipping_addresses")
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Move a pending order to `processing` once payment is confirmed.
    ///
    /// Keyed by payment reference; only pending orders transition, so a
    /// replayed webhook is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(reference = %reference))]
    pub async fn mark_order_processing(&self, reference: &str) -> Result<(), GatewayError> {
        let filter = format!(
            "payment_reference=eq.{}&status=eq.pending",
            urlencoding::encode(reference)
        );
        self.update("orders", &filter, &serde_json::json!({ "status": "processing" }))
            .await
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    /// Insert one analytics event row.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails. Callers treat analytics as
    /// fire-and-forget and only log this.
    pub async fn insert_analytics_event(&self, event: &AnalyticsEvent) -> Result<(), GatewayError> {
        self.insert("analytics_events", event).await
    }

    // =========================================================================
    // Auth passthrough
    // =========================================================================

    /// Sign a user in with email and password against the hosted auth
    /// provider.
    ///
    /// # Errors
    ///
    /// Invalid credentials surface as `GatewayError::Api` with the
    /// provider's `invalid_grant` code; transport failures as `Http`.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthUser, GatewayError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            user: AuthUser,
        }

        let url = format!("{}/token?grant_type=password", self.inner.auth_url);
        let response = self
            .inner
            .http
            .post(&url)
            .json(&serde_json::json!({
                "email": email.as_str(),
                "password": password,
            }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.user)
    }
}

// =============================================================================
// Store trait implementations
// =============================================================================

impl ProductCatalog for GatewayClient {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, GatewayError> {
        self.fetch_product(id).await
    }
}

impl ServerCartStore for GatewayClient {
    #[instrument(skip(self), fields(user_id = %user))]
    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartItemRow>, GatewayError> {
        self.select(
            "cart_items",
            &format!("user_id=eq.{user}&order=created_at.desc"),
        )
        .await
    }

    #[instrument(skip(self), fields(user_id = %user, product_id = %product))]
    async fn upsert_cart_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: u32,
    ) -> Result<CartItemRow, GatewayError> {
        let rows = self
            .insert_returning(
                "cart_items",
                "on_conflict=user_id,product_id",
                "resolution=merge-duplicates,return=representation",
                &serde_json::json!([{
                    "user_id": user,
                    "product_id": product,
                    "quantity": quantity,
                }]),
            )
            .await?;
        Self::first_row(rows, "cart_items")
    }

    #[instrument(skip(self), fields(user_id = %user, line_id = %line))]
    async fn set_cart_quantity(
        &self,
        user: UserId,
        line: CartLineId,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        self.update(
            "cart_items",
            &format!("id=eq.{line}&user_id=eq.{user}"),
            &serde_json::json!({ "quantity": quantity }),
        )
        .await
    }

    #[instrument(skip(self), fields(user_id = %user, line_id = %line))]
    async fn delete_cart_line(&self, user: UserId, line: CartLineId) -> Result<(), GatewayError> {
        self.delete("cart_items", &format!("id=eq.{line}&user_id=eq.{user}"))
            .await
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn clear_cart(&self, user: UserId) -> Result<(), GatewayError> {
        self.delete("cart_items", &format!("user_id=eq.{user}")).await
    }
}

impl OrderStore for GatewayClient {
    #[instrument(skip(self))]
    async fn generate_order_number(&self) -> Result<String, GatewayError> {
        let url = format!("{}/rpc/generate_order_number", self.inner.rest_url);
        let response = self
            .inner
            .http
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    async fn insert_order(&self, order: NewOrder) -> Result<OrderRow, GatewayError> {
        let rows = self
            .insert_returning("orders", "", "return=representation", &order)
            .await?;
        Self::first_row(rows, "orders")
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn insert_order_items(&self, items: Vec<NewOrderItem>) -> Result<(), GatewayError> {
        self.insert("order_items", &items).await
    }
}
