//! # Order Repository
//!
//! Persistence for orders: the immutable snapshot (line items, totals,
//! shipping address), the mutable lifecycle state (status, payment
//! sub-record), and the append-only status history.
//!
//! ## Write Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Order Write Operations                             │
//! │                                                                         │
//! │  insert()          orders + order_items + history rows in one tx       │
//! │  update_status()   status columns + NEW history rows only               │
//! │  update_payment()  payment columns only                                 │
//! │                                                                         │
//! │  There is deliberately no generic update(): the snapshot columns        │
//! │  (items, totals, address) are written once at insert and never          │
//! │  touched again. History rows are inserted, never updated or deleted.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use keel_core::{
    Order, OrderItem, OrderStatus, PaymentMethod, PaymentRecord, PaymentStatus, ShippingAddress,
    StatusEntry,
};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    user_id: String,
    status: OrderStatus,

    subtotal_cents: i64,
    tax_cents: i64,
    shipping_cents: i64,
    discount_cents: i64,
    total_cents: i64,

    ship_recipient: String,
    ship_line1: String,
    ship_line2: Option<String>,
    ship_city: String,
    ship_postal_code: String,
    ship_country: String,

    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    provider_reference: Option<String>,
    paid_amount_cents: Option<i64>,
    paid_at: Option<DateTime<Utc>>,
    refund_amount_cents: Option<i64>,

    estimated_delivery: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    product_id: String,
    name_snapshot: String,
    unit_price_cents: i64,
    quantity: i64,
    line_total_cents: i64,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    status: OrderStatus,
    note: String,
    created_at: DateTime<Utc>,
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, \
     subtotal_cents, tax_cents, shipping_cents, discount_cents, total_cents, \
     ship_recipient, ship_line1, ship_line2, ship_city, ship_postal_code, ship_country, \
     payment_method, payment_status, provider_reference, paid_amount_cents, paid_at, \
     refund_amount_cents, \
     estimated_delivery, delivered_at, cancelled_at, created_at, updated_at";

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a complete order: header row, item rows, and the initial
    /// status-history rows, all in one transaction.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(
            order_number = %order.order_number,
            items = order.items.len(),
            "Inserting order"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query(
            "INSERT INTO orders ( \
                 id, order_number, user_id, status, \
                 subtotal_cents, tax_cents, shipping_cents, discount_cents, total_cents, \
                 ship_recipient, ship_line1, ship_line2, ship_city, ship_postal_code, \
                 ship_country, \
                 payment_method, payment_status, provider_reference, paid_amount_cents, \
                 paid_at, refund_amount_cents, \
                 estimated_delivery, delivered_at, cancelled_at, created_at, updated_at \
             ) VALUES ( \
                 ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26 \
             )",
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.user_id)
        .bind(order.status)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.shipping_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(&order.shipping_address.recipient)
        .bind(&order.shipping_address.line1)
        .bind(&order.shipping_address.line2)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.postal_code)
        .bind(&order.shipping_address.country)
        .bind(order.payment.method)
        .bind(order.payment.status)
        .bind(&order.payment.provider_reference)
        .bind(order.payment.paid_amount_cents)
        .bind(order.payment.paid_at)
        .bind(order.payment.refund_amount_cents)
        .bind(order.estimated_delivery)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items \
                 (id, order_id, product_id, name_snapshot, unit_price_cents, quantity, \
                  line_total_cents, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order.id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.line_total_cents)
            .bind(order.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &order.status_history {
            insert_history_row(&mut tx, &order.id, entry).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    /// Persists a status change: status columns plus the newly appended
    /// history entries.
    ///
    /// `new_entries` must be the entries appended to the in-memory order
    /// since it was loaded; earlier rows are never rewritten.
    pub async fn update_status(&self, order: &Order, new_entries: &[StatusEntry]) -> DbResult<()> {
        debug!(
            order_number = %order.order_number,
            status = %order.status,
            "Updating order status"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE orders \
             SET status = ?2, delivered_at = ?3, cancelled_at = ?4, updated_at = ?5 \
             WHERE id = ?1",
        )
        .bind(&order.id)
        .bind(order.status)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", &order.id));
        }

        for entry in new_entries {
            insert_history_row(&mut tx, &order.id, entry).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    /// Persists the payment sub-record.
    pub async fn update_payment(
        &self,
        order_id: &str,
        payment: &PaymentRecord,
        updated_at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(order_id = %order_id, status = ?payment.status, "Updating order payment");

        let result = sqlx::query(
            "UPDATE orders \
             SET payment_method = ?2, payment_status = ?3, provider_reference = ?4, \
                 paid_amount_cents = ?5, paid_at = ?6, refund_amount_cents = ?7, \
                 updated_at = ?8 \
             WHERE id = ?1",
        )
        .bind(order_id)
        .bind(payment.method)
        .bind(payment.status)
        .bind(&payment.provider_reference)
        .bind(payment.paid_amount_cents)
        .bind(payment.paid_at)
        .bind(payment.refund_amount_cents)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order by its ID, with items and status history assembled.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    /// Gets an order by its human-readable order number.
    pub async fn get_by_order_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?1"
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    /// Gets the order a payment-provider reference points at.
    ///
    /// Webhook handlers use this to correlate provider events back to
    /// an order.
    pub async fn get_by_provider_reference(&self, reference: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE provider_reference = ?1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    /// Lists a user's orders, newest first.
    pub async fn list_by_user(&self, user_id: &str, limit: u32) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.assemble(row).await?);
        }
        Ok(orders)
    }

    /// Counts a user's orders (for pagination).
    pub async fn count_by_user(&self, user_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Assembly
    // =========================================================================

    async fn assemble(&self, row: OrderRow) -> DbResult<Order> {
        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT product_id, name_snapshot, unit_price_cents, quantity, line_total_cents \
             FROM order_items WHERE order_id = ?1 ORDER BY created_at, product_id",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let history = sqlx::query_as::<_, HistoryRow>(
            "SELECT status, note, created_at \
             FROM order_status_history WHERE order_id = ?1 ORDER BY created_at, id",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            status: row.status,
            items: items
                .into_iter()
                .map(|i| OrderItem {
                    product_id: i.product_id,
                    name_snapshot: i.name_snapshot,
                    unit_price_cents: i.unit_price_cents,
                    quantity: i.quantity,
                    line_total_cents: i.line_total_cents,
                })
                .collect(),
            subtotal_cents: row.subtotal_cents,
            tax_cents: row.tax_cents,
            shipping_cents: row.shipping_cents,
            discount_cents: row.discount_cents,
            total_cents: row.total_cents,
            shipping_address: ShippingAddress {
                recipient: row.ship_recipient,
                line1: row.ship_line1,
                line2: row.ship_line2,
                city: row.ship_city,
                postal_code: row.ship_postal_code,
                country: row.ship_country,
            },
            payment: PaymentRecord {
                method: row.payment_method,
                status: row.payment_status,
                provider_reference: row.provider_reference,
                paid_amount_cents: row.paid_amount_cents,
                paid_at: row.paid_at,
                refund_amount_cents: row.refund_amount_cents,
            },
            status_history: history
                .into_iter()
                .map(|h| StatusEntry {
                    status: h.status,
                    note: h.note,
                    at: h.created_at,
                })
                .collect(),
            estimated_delivery: row.estimated_delivery,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

async fn insert_history_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    order_id: &str,
    entry: &StatusEntry,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO order_status_history (id, order_id, status, note, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(order_id)
    .bind(entry.status)
    .bind(&entry.note)
    .bind(entry.at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Generates a human-readable order number: `ORD-YYYYMMDD-XXXX`.
///
/// The suffix comes from the UUID space rather than a counter, so
/// numbers are unique without a coordination table. The UNIQUE
/// constraint on `order_number` backstops the (vanishingly rare)
/// collision.
pub fn generate_order_number(at: DateTime<Utc>) -> String {
    let date = at.format("%Y%m%d");
    let suffix = &Uuid::new_v4().simple().to_string()[..4];
    format!("ORD-{date}-{}", suffix.to_uppercase())
}

/// Helper to generate a new order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
