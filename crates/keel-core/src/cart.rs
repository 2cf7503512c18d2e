//! # Cart Aggregate
//!
//! A user's pending selections before checkout.
//!
//! ## Invariants
//! - Items are unique by `product_id` (adding the same product merges
//!   quantities and refreshes the price snapshot)
//! - Quantity is always >= 1 (updating to 0 removes the item)
//! - Merged quantity never exceeds [`crate::MAX_ITEM_QUANTITY`]
//! - Totals are derived from items on demand, never stored separately
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cart Aggregate Operations                           │
//! │                                                                         │
//! │  Caller Action            Operation               Cart Change           │
//! │  ─────────────            ─────────               ───────────           │
//! │  Add product ───────────► add_item() ───────────► merge or append      │
//! │  Change quantity ───────► update_item_quantity()► set / remove         │
//! │  Remove line ───────────► remove_item() ────────► retain others        │
//! │  Checkout done ─────────► clear() ──────────────► items.clear()        │
//! │  Show summary ──────────► summary() ────────────► (read only, derived) │
//! │                                                                         │
//! │  Every mutating operation recomputes totals implicitly - they are       │
//! │  functions of the items, so there is no separate "recalculate" step.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::MAX_ITEM_QUANTITY;

/// An item in a cart.
///
/// `unit_price_cents` is a snapshot captured at add-time. The validation
/// pass refreshes stale snapshots to the current catalog price so that
/// checkout always charges current pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Product ID (UUID).
    pub product_id: String,

    /// Product name at time of adding (frozen).
    pub name: String,

    /// Price in cents at time of adding (snapshot).
    pub unit_price_cents: i64,

    /// Quantity in cart (>= 1).
    pub quantity: i64,

    /// When this item was first added to the cart.
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Calculates the line total (unit price × quantity).
    #[inline]
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

/// Derived cart summary: never persisted separately from items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    /// Number of distinct line items.
    pub item_count: usize,
    /// Sum of quantities across all line items.
    pub total_quantity: i64,
    /// Sum of line totals, in cents.
    pub total_cents: i64,
}

/// A user's shopping cart.
///
/// Owned by exactly one user; created lazily on first add and cleared
/// (not deleted) when its contents are converted into an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    /// Owning user.
    pub user_id: String,

    /// Line items, in insertion order.
    pub items: Vec<CartItem>,

    /// When the cart was created.
    pub created_at: DateTime<Utc>,

    /// When the cart was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Cart {
            user_id: user_id.into(),
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds a product to the cart.
    ///
    /// ## Behavior
    /// - Product already present: quantities merge (old + new) and the
    ///   price snapshot is refreshed to `unit_price`
    /// - Otherwise a new line item is appended
    /// - The post-merge quantity must respect the per-product maximum
    ///
    /// ## Errors
    /// - `InvalidQuantity` when `quantity < 1`
    /// - `QuantityLimitExceeded` when the merged quantity exceeds the cap;
    ///   the cart is left unchanged
    pub fn add_item(
        &mut self,
        product_id: impl Into<String>,
        name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> CoreResult<()> {
        let product_id = product_id.into();

        if quantity < 1 {
            return Err(CoreError::InvalidQuantity { quantity });
        }

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            let merged = item.quantity + quantity;
            if merged > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityLimitExceeded {
                    product_id,
                    requested: merged,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            item.quantity = merged;
            item.unit_price_cents = unit_price.cents();
            self.updated_at = Utc::now();
            return Ok(());
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityLimitExceeded {
                product_id,
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        self.items.push(CartItem {
            product_id,
            name: name.into(),
            unit_price_cents: unit_price.cents(),
            quantity,
            added_at: Utc::now(),
        });
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Sets the quantity of an item.
    ///
    /// ## Behavior
    /// - `quantity == 0` is equivalent to [`Cart::remove_item`]
    /// - Negative quantity fails with `InvalidQuantity`
    /// - Unknown product fails with `ItemNotFound`
    pub fn update_item_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity < 0 {
            return Err(CoreError::InvalidQuantity { quantity });
        }

        if quantity == 0 {
            return self.remove_item(product_id);
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityLimitExceeded {
                product_id: product_id.to_string(),
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or_else(|| CoreError::ItemNotFound {
                product_id: product_id.to_string(),
            })?;

        item.quantity = quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Removes an item from the cart by product ID.
    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.product_id != product_id);

        if self.items.len() == initial_len {
            return Err(CoreError::ItemNotFound {
                product_id: product_id.to_string(),
            });
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    /// Clears all items from the cart. Always succeeds.
    pub fn clear(&mut self) {
        self.items.clear();
        self.updated_at = Utc::now();
    }

    /// Returns the derived summary (counts and total amount).
    pub fn summary(&self) -> CartSummary {
        CartSummary {
            item_count: self.items.len(),
            total_quantity: self.items.iter().map(|i| i.quantity).sum(),
            total_cents: self.subtotal_cents(),
        }
    }

    /// Calculates the subtotal over all line items, in cents.
    pub fn subtotal_cents(&self) -> i64 {
        self.items.iter().map(|i| i.line_total_cents()).sum()
    }

    /// Checks if the cart is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up a line item by product ID.
    pub fn item(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
