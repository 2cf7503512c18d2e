//! # Cart Repository
//!
//! Persistence for the cart aggregate. The cart's business rules
//! (merge-on-add, quantity caps, derived totals) live entirely in
//! [`keel_core::Cart`]; this repository only loads and stores rows.
//!
//! ## Persistence Strategy
//! A cart is one `carts` row plus N `cart_items` rows. Saving replaces
//! the item set wholesale inside a transaction, which keeps the stored
//! rows an exact mirror of the in-memory aggregate without diffing.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use keel_core::{Cart, CartItem};

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct CartRow {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: String,
    name_snapshot: String,
    unit_price_cents: i64,
    quantity: i64,
    added_at: DateTime<Utc>,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Loads a user's cart, or `None` if they have never had one.
    pub async fn get(&self, user_id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT created_at, updated_at FROM carts WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, CartItemRow>(
            "SELECT product_id, name_snapshot, unit_price_cents, quantity, added_at \
             FROM cart_items WHERE user_id = ?1 ORDER BY added_at, product_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Cart {
            user_id: user_id.to_string(),
            items: items
                .into_iter()
                .map(|r| CartItem {
                    product_id: r.product_id,
                    name: r.name_snapshot,
                    unit_price_cents: r.unit_price_cents,
                    quantity: r.quantity,
                    added_at: r.added_at,
                })
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    /// Loads a user's cart, creating an empty one in memory if absent.
    ///
    /// The empty cart is not persisted until the first [`Self::save`].
    pub async fn get_or_new(&self, user_id: &str) -> DbResult<Cart> {
        Ok(self
            .get(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id)))
    }

    /// Persists a cart, replacing its stored item set.
    ///
    /// Runs in a transaction: the carts row is upserted, then the item
    /// rows are deleted and reinserted, so a reader never observes a
    /// half-saved cart.
    pub async fn save(&self, cart: &Cart) -> DbResult<()> {
        debug!(user_id = %cart.user_id, items = cart.items.len(), "Saving cart");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query(
            "INSERT INTO carts (user_id, created_at, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(&cart.user_id)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(&cart.user_id)
            .execute(&mut *tx)
            .await?;

        for item in &cart.items {
            sqlx::query(
                "INSERT INTO cart_items \
                 (id, user_id, product_id, name_snapshot, unit_price_cents, quantity, added_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&cart.user_id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.added_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    /// Deletes a cart and its items entirely.
    ///
    /// Normal checkout uses `Cart::clear` + [`Self::save`] instead, which
    /// keeps the carts row; this is for account removal.
    pub async fn delete(&self, user_id: &str) -> DbResult<()> {
        debug!(user_id = %user_id, "Deleting cart");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM carts WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
