//! # Cart Service
//!
//! Orchestrates cart mutations: loads the aggregate, looks up catalog
//! data for price snapshots, applies the pure cart rules, and persists
//! the result.
//!
//! ## Validation Pass
//! Carts can go stale between browsing and checkout: products get
//! deactivated, prices change, stock drains. `validate()` reconciles a
//! cart against the current catalog and reports every problem found,
//! refreshing stale price snapshots in place so a subsequent checkout
//! charges current prices.

use tracing::{debug, info};

use crate::error::CheckoutResult;
use keel_core::{Cart, CartSummary, CoreError};
use keel_db::Database;

/// A discrepancy between a cart line and the current catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartProblem {
    /// The product row no longer exists. The catalog only soft-deletes,
    /// so this covers external cleanup (data imports, manual SQL) that
    /// the cart must survive rather than a normal code path.
    ProductMissing { product_id: String },
    /// The product was deactivated after being added.
    ProductInactive { product_id: String },
    /// Current stock cannot cover the line quantity.
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },
    /// The catalog price moved since the snapshot was taken.
    /// The snapshot has been refreshed to `new_cents`.
    PriceChanged {
        product_id: String,
        old_cents: i64,
        new_cents: i64,
    },
}

/// Service for cart operations.
#[derive(Debug, Clone)]
pub struct CartService {
    db: Database,
}

impl CartService {
    /// Creates a new CartService.
    pub fn new(db: Database) -> Self {
        CartService { db }
    }

    /// Loads a user's cart (empty if they have none).
    pub async fn get(&self, user_id: &str) -> CheckoutResult<Cart> {
        Ok(self.db.carts().get_or_new(user_id).await?)
    }

    /// Adds a product to a user's cart.
    ///
    /// The product must exist and be active; its current name and price
    /// are snapshotted onto the line item. Adding a product already in
    /// the cart merges quantities and refreshes the snapshot.
    pub async fn add_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> CheckoutResult<CartSummary> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let mut cart = self.db.carts().get_or_new(user_id).await?;
        cart.add_item(product_id, &product.name, quantity, product.price())?;
        self.db.carts().save(&cart).await?;

        debug!(user_id = %user_id, product_id = %product_id, quantity, "Item added to cart");
        Ok(cart.summary())
    }

    /// Sets the quantity of a cart line. Quantity 0 removes the line.
    pub async fn update_quantity(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> CheckoutResult<CartSummary> {
        let mut cart = self.db.carts().get_or_new(user_id).await?;
        cart.update_item_quantity(product_id, quantity)?;
        self.db.carts().save(&cart).await?;
        Ok(cart.summary())
    }

    /// Removes a cart line.
    pub async fn remove_item(&self, user_id: &str, product_id: &str) -> CheckoutResult<CartSummary> {
        let mut cart = self.db.carts().get_or_new(user_id).await?;
        cart.remove_item(product_id)?;
        self.db.carts().save(&cart).await?;
        Ok(cart.summary())
    }

    /// Empties a user's cart.
    pub async fn clear(&self, user_id: &str) -> CheckoutResult<()> {
        let mut cart = self.db.carts().get_or_new(user_id).await?;
        cart.clear();
        self.db.carts().save(&cart).await?;
        Ok(())
    }

    /// Reconciles a cart against the current catalog.
    ///
    /// Returns every problem found (possibly several per cart). Stale
    /// price snapshots are refreshed and persisted; missing, inactive,
    /// and under-stocked lines are reported but left in the cart for the
    /// user to resolve.
    pub async fn validate(&self, user_id: &str) -> CheckoutResult<Vec<CartProblem>> {
        let mut cart = self.db.carts().get_or_new(user_id).await?;
        let mut problems = Vec::new();
        let mut refreshed = false;

        for item in &mut cart.items {
            let product = match self.db.products().get_by_id(&item.product_id).await? {
                Some(p) => p,
                None => {
                    problems.push(CartProblem::ProductMissing {
                        product_id: item.product_id.clone(),
                    });
                    continue;
                }
            };

            if !product.is_active {
                problems.push(CartProblem::ProductInactive {
                    product_id: item.product_id.clone(),
                });
                continue;
            }

            if product.stock < item.quantity {
                problems.push(CartProblem::InsufficientStock {
                    product_id: item.product_id.clone(),
                    available: product.stock,
                    requested: item.quantity,
                });
            }

            if product.price_cents != item.unit_price_cents {
                problems.push(CartProblem::PriceChanged {
                    product_id: item.product_id.clone(),
                    old_cents: item.unit_price_cents,
                    new_cents: product.price_cents,
                });
                item.unit_price_cents = product.price_cents;
                refreshed = true;
            }
        }

        if refreshed {
            self.db.carts().save(&cart).await?;
            info!(user_id = %user_id, "Cart price snapshots refreshed");
        }

        Ok(problems)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
