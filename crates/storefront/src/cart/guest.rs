//! Session-resident cart for visitors without an account.
//!
//! Stored in the session under a single key and mutated in place; every
//! operation here is pure so the whole struct is trivially testable.

use serde::{Deserialize, Serialize};

use dezora_luxe_core::ProductId;

/// One guest cart entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCartEntry {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// The guest cart. Entries keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCart {
    entries: Vec<GuestCartEntry>,
}

impl GuestCart {
    /// Add `quantity` units of a product, summing with any existing entry.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.product_id == product_id) {
            entry.quantity = entry.quantity.saturating_add(quantity);
        } else {
            self.entries.push(GuestCartEntry {
                product_id,
                quantity,
            });
        }
    }

    /// Overwrite the quantity for a product. Quantities below one remove
    /// the entry instead.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) {
        if quantity < 1 {
            self.remove(product_id);
            return;
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.product_id == product_id) {
            entry.quantity = quantity;
        }
    }

    /// Remove a product's entry. No-op when absent.
    pub fn remove(&mut self, product_id: ProductId) {
        self.entries.retain(|e| e.product_id != product_id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[GuestCartEntry] {
        &self.entries
    }
}
