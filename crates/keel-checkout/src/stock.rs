//! # Stock Ledger
//!
//! The single authority over stock movements. Every decrement and
//! restore goes through this service; nothing else in the system writes
//! the `stock` column.
//!
//! ## Reservation Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stock Reservation                                │
//! │                                                                         │
//! │  check()    read-only precheck - advisory, can go stale immediately    │
//! │  reserve()  atomic conditional decrement - the authoritative gate      │
//! │  restore()  atomic increment - cancellation / compensation             │
//! │                                                                         │
//! │  A reserve() that loses a race fails cleanly with InsufficientStock     │
//! │  carrying the stock level observed after the race, so two concurrent    │
//! │  reservations can never jointly oversell a product.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{debug, warn};

use crate::error::CheckoutResult;
use keel_core::CoreError;
use keel_db::Database;

/// Service mediating all stock movements.
#[derive(Debug, Clone)]
pub struct StockLedger {
    db: Database,
}

impl StockLedger {
    /// Creates a new StockLedger over the given database.
    pub fn new(db: Database) -> Self {
        StockLedger { db }
    }

    /// Read-only availability check.
    ///
    /// Advisory only: a passing check can be invalidated by a concurrent
    /// reservation before the caller acts on it. [`Self::reserve`] is the
    /// authoritative gate.
    pub async fn check(&self, product_id: &str, quantity: i64) -> CheckoutResult<()> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        if product.stock < quantity {
            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                available: product.stock,
                requested: quantity,
            }
            .into());
        }

        Ok(())
    }

    /// Atomically reserves stock for a product.
    ///
    /// ## Errors
    /// - `ProductNotFound` when the product is missing or inactive
    /// - `InsufficientStock` when the conditional decrement was rejected;
    ///   `available` is the level observed after losing the race
    pub async fn reserve(&self, product_id: &str, quantity: i64) -> CheckoutResult<()> {
        match self.db.products().reserve_stock(product_id, quantity).await? {
            Some(remaining) => {
                debug!(product_id = %product_id, quantity, remaining, "Stock reserved");
                Ok(())
            }
            None => {
                // The guard rejected; re-read to tell the caller why.
                let product = self
                    .db
                    .products()
                    .get_by_id(product_id)
                    .await?
                    .filter(|p| p.is_active)
                    .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

                warn!(
                    product_id = %product_id,
                    available = product.stock,
                    requested = quantity,
                    "Stock reservation rejected"
                );

                Err(CoreError::InsufficientStock {
                    product_id: product_id.to_string(),
                    available: product.stock,
                    requested: quantity,
                }
                .into())
            }
        }
    }

    /// Restores previously reserved stock.
    ///
    /// Used for cancellations and for compensating a partially reserved
    /// order. Returns the new stock level.
    pub async fn restore(&self, product_id: &str, quantity: i64) -> CheckoutResult<i64> {
        let level = self.db.products().restore_stock(product_id, quantity).await?;
        debug!(product_id = %product_id, quantity, level, "Stock restored");
        Ok(level)
    }

    /// Reads the current stock level, `None` if the product is unknown.
    pub async fn level(&self, product_id: &str) -> CheckoutResult<Option<i64>> {
        Ok(self.db.products().stock_level(product_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keel_core::Product;
    use keel_db::{generate_product_id, DbConfig};

    async fn seed(db: &Database, stock: i64) -> String {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: format!("SKU-{}", &generate_product_id()[..8]),
            name: "Widget".to_string(),
            price_cents: 5000,
            stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        product.id
    }

    #[tokio::test]
    async fn test_reserve_and_restore() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = StockLedger::new(db.clone());
        let id = seed(&db, 10).await;

        ledger.reserve(&id, 4).await.unwrap();
        assert_eq!(ledger.level(&id).await.unwrap(), Some(6));

        let level = ledger.restore(&id, 4).await.unwrap();
        assert_eq!(level, 10);
    }

    #[tokio::test]
    async fn test_reserve_shortfall_reports_available() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = StockLedger::new(db.clone());
        let id = seed(&db, 2).await;

        let err = ledger.reserve(&id, 5).await.unwrap_err();
        match err.as_business() {
            Some(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(*available, 2);
                assert_eq!(*requested, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Failed reservation leaves stock untouched.
        assert_eq!(ledger.level(&id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_reserve_unknown_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = StockLedger::new(db);

        let err = ledger.reserve("ghost", 1).await.unwrap_err();
        assert!(matches!(
            err.as_business(),
            Some(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_check_is_advisory_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = StockLedger::new(db.clone());
        let id = seed(&db, 3).await;

        ledger.check(&id, 3).await.unwrap();
        assert!(ledger.check(&id, 4).await.is_err());
        // check() never mutates
        assert_eq!(ledger.level(&id).await.unwrap(), Some(3));
    }
}
