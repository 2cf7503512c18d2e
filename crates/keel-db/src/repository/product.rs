//! # Product Repository
//!
//! Database operations for products: catalog reads plus the atomic
//! stock primitives backing the Stock Ledger.
//!
//! ## Stock Update Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Conditional Delta Updates                            │
//! │                                                                         │
//! │  ❌ WRONG: read-modify-write (races under concurrency)                 │
//! │     stock = SELECT stock ...; UPDATE products SET stock = stock' ...   │
//! │                                                                         │
//! │  ✅ CORRECT: guarded delta in a single statement                       │
//! │     UPDATE products SET stock = stock - ?                              │
//! │     WHERE id = ? AND stock >= ?                                        │
//! │     RETURNING stock                                                    │
//! │                                                                         │
//! │  Two reservations that would jointly exceed stock cannot both           │
//! │  succeed: the database serializes the writes and the guard rejects      │
//! │  the loser. Combined with the CHECK (stock >= 0) constraint, stock      │
//! │  can never go negative.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use keel_core::Product;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

const PRODUCT_COLUMNS: &str =
    "id, sku, name, price_cents, stock, is_active, created_at, updated_at";

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products, sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` when the SKU already exists.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            "INSERT INTO products \
             (id, sku, name, price_cents, stock, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates a product's price and name.
    ///
    /// Stock is deliberately excluded: it is only mutated through the
    /// delta operations below.
    pub async fn update_catalog_fields(
        &self,
        id: &str,
        name: &str,
        price_cents: i64,
    ) -> DbResult<()> {
        debug!(id = %id, "Updating product catalog fields");

        let result = sqlx::query(
            "UPDATE products SET name = ?2, price_cents = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(name)
        .bind(price_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical orders still reference the product, so rows are never
    /// physically deleted.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Reads the current stock level.
    pub async fn stock_level(&self, id: &str) -> DbResult<Option<i64>> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(stock)
    }

    /// Attempts an atomic stock reservation (conditional decrement).
    ///
    /// ## Returns
    /// - `Ok(Some(new_stock))` - decrement applied
    /// - `Ok(None)` - guard rejected: product missing, inactive, or
    ///   stock below the requested quantity; the caller decides which
    ///   business error applies
    pub async fn reserve_stock(&self, id: &str, quantity: i64) -> DbResult<Option<i64>> {
        debug!(id = %id, quantity = %quantity, "Reserving stock");

        let new_stock: Option<i64> = sqlx::query_scalar(
            "UPDATE products \
             SET stock = stock - ?2, updated_at = ?3 \
             WHERE id = ?1 AND is_active = 1 AND stock >= ?2 \
             RETURNING stock",
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(new_stock)
    }

    /// Atomically restores stock (delta increment).
    ///
    /// Used by order cancellation. Idempotency is the caller's
    /// responsibility: the Order State Machine invokes restore exactly
    /// once per order via the status-history invariant.
    pub async fn restore_stock(&self, id: &str, quantity: i64) -> DbResult<i64> {
        debug!(id = %id, quantity = %quantity, "Restoring stock");

        let new_stock: Option<i64> = sqlx::query_scalar(
            "UPDATE products \
             SET stock = stock + ?2, updated_at = ?3 \
             WHERE id = ?1 \
             RETURNING stock",
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        new_stock.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
