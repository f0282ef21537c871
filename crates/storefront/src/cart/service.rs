//! Cart orchestration over the guest and server backends.

use tracing::{instrument, warn};

use dezora_luxe_core::{AnalyticsSessionId, CartLineId, ProductId, UserId};

use crate::gateway::{AnalyticsEvent, GatewayError, ProductCatalog, ServerCartStore};
use crate::models::CurrentUser;
use crate::services::AnalyticsSink;

use super::guest::GuestCart;
use super::{Cart, CartLine};

/// Cart operations for the current visitor.
///
/// Dispatches to the server cart when a user is signed in and to the
/// session cart otherwise. Guest line ids are synthesized from the product
/// id so both backends expose the same line-addressed surface.
pub struct CartService<S> {
    store: S,
    analytics: AnalyticsSink,
    session_id: AnalyticsSessionId,
    user: Option<CurrentUser>,
}

impl<S> CartService<S>
where
    S: ProductCatalog + ServerCartStore,
{
    pub fn new(
        store: S,
        analytics: AnalyticsSink,
        session_id: AnalyticsSessionId,
        user: Option<CurrentUser>,
    ) -> Self {
        Self {
            store,
            analytics,
            session_id,
            user,
        }
    }

    /// Load the cart read model for the current visitor.
    ///
    /// This never fails: a cart that cannot be loaded renders as empty, and
    /// a line whose product lookup fails renders without product data. The
    /// storefront must stay browsable when the gateway is degraded.
    #[instrument(skip_all, fields(authenticated = self.user.is_some()))]
    pub async fn load(&self, guest: &GuestCart) -> Cart {
        match &self.user {
            Some(user) => self.load_server_cart(user.id).await,
            None => self.load_guest_cart(guest).await,
        }
    }

    async fn load_server_cart(&self, user: UserId) -> Cart {
        let rows = match self.store.cart_lines(user).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Failed to load cart rows, rendering empty cart");
                return Cart::default();
            }
        };

        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            lines.push(CartLine {
                id: row.id,
                product_id: row.product_id,
                quantity: row.quantity,
                product: self.lookup_product(row.product_id).await,
            });
        }
        Cart { lines }
    }

    async fn load_guest_cart(&self, guest: &GuestCart) -> Cart {
        let mut lines = Vec::with_capacity(guest.entries().len());
        for entry in guest.entries() {
            lines.push(CartLine {
                id: guest_line_id(entry.product_id),
                product_id: entry.product_id,
                quantity: entry.quantity,
                product: self.lookup_product(entry.product_id).await,
            });
        }
        Cart { lines }
    }

    async fn lookup_product(&self, id: ProductId) -> Option<crate::gateway::Product> {
        match self.store.product(id).await {
            Ok(product) => product,
            Err(e) => {
                warn!(product_id = %id, error = %e, "Product lookup failed for cart line");
                None
            }
        }
    }

    /// Add a product to the cart.
    ///
    /// Guest entries accumulate: adding twice sums the quantities. The
    /// server cart upserts on `(user, product)` with replace semantics, so
    /// for a signed-in user the stored quantity becomes exactly `quantity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cart write fails. Guest adds cannot
    /// fail.
    #[instrument(skip(self, guest), fields(product_id = %product_id))]
    pub async fn add(
        &self,
        guest: &mut GuestCart,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        let is_guest = match &self.user {
            Some(user) => {
                self.store
                    .upsert_cart_line(user.id, product_id, quantity)
                    .await?;
                false
            }
            None => {
                guest.add(product_id, quantity);
                true
            }
        };

        self.analytics.track(AnalyticsEvent {
            event_name: "add_to_cart".to_string(),
            session_id: self.session_id.as_str().to_string(),
            user_id: self.user.as_ref().map(|u| u.id),
            product_id: Some(product_id),
            order_id: None,
            path: None,
            metadata: serde_json::json!({ "quantity": quantity, "guest": is_guest }),
        });
        Ok(())
    }

    /// Set a line's quantity. Anything below one removes the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cart write fails.
    #[instrument(skip(self, guest), fields(line_id = %line))]
    pub async fn update_quantity(
        &self,
        guest: &mut GuestCart,
        line: CartLineId,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        if quantity < 1 {
            return self.remove(guest, line).await;
        }
        match &self.user {
            Some(user) => self.store.set_cart_quantity(user.id, line, quantity).await,
            None => {
                guest.set_quantity(guest_product_id(line), quantity);
                Ok(())
            }
        }
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cart write fails.
    #[instrument(skip(self, guest), fields(line_id = %line))]
    pub async fn remove(&self, guest: &mut GuestCart, line: CartLineId) -> Result<(), GatewayError> {
        match &self.user {
            Some(user) => self.store.delete_cart_line(user.id, line).await,
            None => {
                guest.remove(guest_product_id(line));
                Ok(())
            }
        }
    }

    /// Empty the cart. Safe to call on an already-empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cart write fails.
    #[instrument(skip_all)]
    pub async fn clear(&self, guest: &mut GuestCart) -> Result<(), GatewayError> {
        match &self.user {
            Some(user) => self.store.clear_cart(user.id).await,
            None => {
                guest.clear();
                Ok(())
            }
        }
    }

    /// Merge the guest cart into a user's server cart after sign-in.
    ///
    /// Best effort: each entry is upserted independently, a failed entry is
    /// logged and skipped, and the guest cart is cleared either way. Login
    /// must never be blocked by a cart write.
    #[instrument(skip(self, guest), fields(user_id = %user, entries = guest.entries().len()))]
    pub async fn sync_guest_cart(&self, guest: &mut GuestCart, user: UserId) {
        for entry in guest.entries() {
            if let Err(e) = self
                .store
                .upsert_cart_line(user, entry.product_id, entry.quantity)
                .await
            {
                warn!(
                    product_id = %entry.product_id,
                    error = %e,
                    "Failed to sync guest cart entry, skipping"
                );
            }
        }
        guest.clear();
    }
}

/// Guest lines have no server row, so the line id is the product id.
fn guest_line_id(product_id: ProductId) -> CartLineId {
    CartLineId::new(product_id.as_uuid())
}

fn guest_product_id(line: CartLineId) -> ProductId {
    ProductId::new(line.as_uuid())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Utc;
    use dezora_luxe_core::{Amount, Email};

    use crate::gateway::{CartItemRow, Product};

    use super::*;

    /// In-memory stand-in for the gateway's cart and catalog surface.
    #[derive(Default)]
    struct MockStore {
        products: Mutex<HashMap<ProductId, Product>>,
        rows: Mutex<Vec<CartItemRow>>,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl MockStore {
        fn with_product(self, price: i64) -> (Self, ProductId) {
            let id = ProductId::generate();
            self.products.lock().unwrap().insert(
                id,
                Product {
                    id,
                    name: "Ankara Tote".to_string(),
                    category: "bags".to_string(),
                    price: Amount::from_naira(price),
                    stock: 5,
                    images: vec![],
                },
            );
            (self, id)
        }

        fn api_error() -> GatewayError {
            GatewayError::Api {
                code: "42501".to_string(),
                message: "permission denied".to_string(),
            }
        }
    }

    impl ProductCatalog for MockStore {
        async fn product(&self, id: ProductId) -> Result<Option<Product>, GatewayError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(Self::api_error());
            }
            Ok(self.products.lock().unwrap().get(&id).cloned())
        }
    }

    impl ServerCartStore for MockStore {
        async fn cart_lines(&self, user: UserId) -> Result<Vec<CartItemRow>, GatewayError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(Self::api_error());
            }
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().filter(|r| r.user_id == user).cloned().collect())
        }

        async fn upsert_cart_line(
            &self,
            user: UserId,
            product: ProductId,
            quantity: u32,
        ) -> Result<CartItemRow, GatewayError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Self::api_error());
            }
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows
                .iter_mut()
                .find(|r| r.user_id == user && r.product_id == product)
            {
                row.quantity = quantity;
                return Ok(row.clone());
            }
            let row = CartItemRow {
                id: CartLineId::generate(),
                user_id: user,
                product_id: product,
                quantity,
                created_at: Utc::now(),
            };
            rows.push(row.clone());
            Ok(row)
        }

        async fn set_cart_quantity(
            &self,
            user: UserId,
            line: CartLineId,
            quantity: u32,
        ) -> Result<(), GatewayError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|r| r.id == line && r.user_id == user) {
                row.quantity = quantity;
            }
            Ok(())
        }

        async fn delete_cart_line(
            &self,
            user: UserId,
            line: CartLineId,
        ) -> Result<(), GatewayError> {
            self.rows
                .lock()
                .unwrap()
                .retain(|r| !(r.id == line && r.user_id == user));
            Ok(())
        }

        async fn clear_cart(&self, user: UserId) -> Result<(), GatewayError> {
            self.rows.lock().unwrap().retain(|r| r.user_id != user);
            Ok(())
        }
    }

    fn signed_in(user: UserId) -> Option<CurrentUser> {
        Some(CurrentUser {
            id: user,
            email: Email::parse("ada@dezora.example").unwrap(),
        })
    }

    fn service(store: MockStore, user: Option<CurrentUser>) -> CartService<MockStore> {
        CartService::new(
            store,
            AnalyticsSink::disabled(),
            AnalyticsSessionId::generate(),
            user,
        )
    }

    #[tokio::test]
    async fn test_guest_add_sums_but_server_add_overwrites() {
        // Two backends, two conflict policies.
        let (store, product) = MockStore::default().with_product(5000);
        let guest_service = service(store, None);
        let mut guest = GuestCart::default();
        guest_service.add(&mut guest, product, 1).await.unwrap();
        guest_service.add(&mut guest, product, 2).await.unwrap();
        assert_eq!(guest.entries()[0].quantity, 3);

        let (store, product) = MockStore::default().with_product(5000);
        let user = UserId::generate();
        let server_service = service(store, signed_in(user));
        let mut unused = GuestCart::default();
        server_service.add(&mut unused, product, 1).await.unwrap();
        server_service.add(&mut unused, product, 2).await.unwrap();
        let cart = server_service.load(&unused).await;
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_load_joins_product_data() {
        let (store, product) = MockStore::default().with_product(12_500);
        let user = UserId::generate();
        let svc = service(store, signed_in(user));
        let mut guest = GuestCart::default();
        svc.add(&mut guest, product, 2).await.unwrap();

        let cart = svc.load(&guest).await;
        assert_eq!(cart.count(), 2);
        assert_eq!(cart.subtotal(), Amount::from_naira(25_000));
        assert_eq!(cart.lines[0].product.as_ref().unwrap().name, "Ankara Tote");
    }

    #[tokio::test]
    async fn test_load_failure_renders_empty_cart() {
        let (store, product) = MockStore::default().with_product(5000);
        let user = UserId::generate();
        let svc = service(store, signed_in(user));
        let mut guest = GuestCart::default();
        svc.add(&mut guest, product, 1).await.unwrap();

        svc.store.fail_reads.store(true, Ordering::SeqCst);
        let cart = svc.load(&guest).await;
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_load_keeps_lines_with_missing_products() {
        let store = MockStore::default();
        let orphan = ProductId::generate();
        let svc = service(store, None);
        let mut guest = GuestCart::default();
        svc.add(&mut guest, orphan, 2).await.unwrap();

        let cart = svc.load(&guest).await;
        assert_eq!(cart.lines.len(), 1);
        assert!(cart.lines[0].product.is_none());
        assert_eq!(cart.count(), 2);
        assert_eq!(cart.subtotal(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_update_quantity_below_one_removes_line() {
        let (store, product) = MockStore::default().with_product(5000);
        let user = UserId::generate();
        let svc = service(store, signed_in(user));
        let mut guest = GuestCart::default();
        svc.add(&mut guest, product, 2).await.unwrap();

        let cart = svc.load(&guest).await;
        svc.update_quantity(&mut guest, cart.lines[0].id, 0)
            .await
            .unwrap();

        assert!(svc.load(&guest).await.is_empty());
    }

    #[tokio::test]
    async fn test_guest_line_id_round_trips_through_update() {
        let (store, product) = MockStore::default().with_product(5000);
        let svc = service(store, None);
        let mut guest = GuestCart::default();
        svc.add(&mut guest, product, 1).await.unwrap();

        let cart = svc.load(&guest).await;
        svc.update_quantity(&mut guest, cart.lines[0].id, 4)
            .await
            .unwrap();

        assert_eq!(guest.entries()[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_cart_writes_are_scoped_to_their_owner() {
        let (store, product) = MockStore::default().with_product(5000);
        let owner = UserId::generate();
        let row = store.upsert_cart_line(owner, product, 2).await.unwrap();

        // A different signed-in user who somehow knows the row id.
        let intruder = UserId::generate();
        let svc = service(store, signed_in(intruder));
        let mut guest = GuestCart::default();
        svc.update_quantity(&mut guest, row.id, 99).await.unwrap();
        svc.remove(&mut guest, row.id).await.unwrap();

        let rows = svc.store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (store, product) = MockStore::default().with_product(5000);
        let user = UserId::generate();
        let svc = service(store, signed_in(user));
        let mut guest = GuestCart::default();
        svc.add(&mut guest, product, 1).await.unwrap();

        svc.clear(&mut guest).await.unwrap();
        svc.clear(&mut guest).await.unwrap();
        assert!(svc.load(&guest).await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_guest_cart_moves_entries_and_clears() {
        let (store, product) = MockStore::default().with_product(5000);
        let user = UserId::generate();
        let svc = service(store, signed_in(user));
        let mut guest = GuestCart::default();
        guest.add(product, 3);

        svc.sync_guest_cart(&mut guest, user).await;

        assert!(guest.is_empty());
        let cart = svc.load(&guest).await;
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_sync_guest_cart_survives_write_failures() {
        let (store, product) = MockStore::default().with_product(5000);
        store.fail_writes.store(true, Ordering::SeqCst);
        let user = UserId::generate();
        let svc = service(store, signed_in(user));
        let mut guest = GuestCart::default();
        guest.add(product, 3);

        // Must not return an error or leave the guest cart behind.
        svc.sync_guest_cart(&mut guest, user).await;
        assert!(guest.is_empty());
    }
}
