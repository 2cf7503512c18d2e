//! # Order Service
//!
//! Order lifecycle orchestration: creation from a cart, status
//! transitions, and cancellation with stock compensation.
//!
//! ## Creation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Creation                                    │
//! │                                                                         │
//! │  1. Load cart ──────────── empty? ──► EmptyOrder                       │
//! │  2. Check all lines ────── any short? ──► InsufficientStock            │
//! │  3. Reserve all lines ──── one fails? ──► restore the earlier          │
//! │         │                                  reservations, then fail     │
//! │  4. Price (subtotal, tax, shipping, discount, total)                   │
//! │  5. Persist order: Pending, history "Order created",                   │
//! │     estimated delivery = now + lead time                               │
//! │  6. Clear cart                                                          │
//! │                                                                         │
//! │  Step 2 is a cheap fail-fast pass; step 3 is the authoritative gate.    │
//! │  Reservations taken in step 3 that cannot complete are compensated      │
//! │  before the error surfaces, so a failed checkout never leaks stock.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::error::CheckoutResult;
use crate::stock::StockLedger;
use keel_core::{
    CoreError, Order, OrderItem, OrderStatus, PaymentMethod, PaymentRecord, PricingPolicy,
    ShippingAddress, StatusEntry, DELIVERY_LEAD_DAYS,
};
use keel_db::{generate_order_id, generate_order_number, Database};

/// Service for order lifecycle operations.
#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
    stock: StockLedger,
    pricing: PricingPolicy,
}

impl OrderService {
    /// Creates a new OrderService with the default pricing policy.
    pub fn new(db: Database) -> Self {
        Self::with_policy(db, PricingPolicy::default())
    }

    /// Creates a new OrderService with a custom pricing policy.
    pub fn with_policy(db: Database, pricing: PricingPolicy) -> Self {
        let stock = StockLedger::new(db.clone());
        OrderService { db, stock, pricing }
    }

    /// Creates an order from the user's cart.
    ///
    /// On success the cart is cleared and the returned order is
    /// `Pending` with its stock reserved. On any failure the cart and
    /// all stock levels are left exactly as they were.
    pub async fn create(
        &self,
        user_id: &str,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> CheckoutResult<Order> {
        let mut cart = self.db.carts().get_or_new(user_id).await?;
        if cart.is_empty() {
            return Err(CoreError::EmptyOrder.into());
        }

        // Fail-fast pass: freeze current catalog data and surface stock
        // problems before any state changes.
        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let product = self
                .db
                .products()
                .get_by_id(&line.product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

            if product.stock < line.quantity {
                return Err(CoreError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    available: product.stock,
                    requested: line.quantity,
                }
                .into());
            }

            // Snapshot current catalog name and price, not the possibly
            // stale cart snapshot.
            items.push(OrderItem {
                product_id: product.id.clone(),
                name_snapshot: product.name.clone(),
                unit_price_cents: product.price_cents,
                quantity: line.quantity,
                line_total_cents: product.price_cents * line.quantity,
            });
        }

        // Authoritative gate: reserve every line, compensating on failure.
        let mut reserved: Vec<(&str, i64)> = Vec::with_capacity(items.len());
        for item in &items {
            match self.stock.reserve(&item.product_id, item.quantity).await {
                Ok(()) => reserved.push((&item.product_id, item.quantity)),
                Err(err) => {
                    warn!(
                        user_id = %user_id,
                        product_id = %item.product_id,
                        "Reservation failed mid-checkout, compensating"
                    );
                    self.compensate(&reserved).await;
                    return Err(err);
                }
            }
        }

        let totals = self.pricing.price(&items);
        let now = Utc::now();
        let order = Order {
            id: generate_order_id(),
            order_number: generate_order_number(now),
            user_id: user_id.to_string(),
            status: OrderStatus::Pending,
            items,
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            shipping_cents: totals.shipping.cents(),
            discount_cents: totals.discount.cents(),
            total_cents: totals.total.cents(),
            shipping_address,
            payment: PaymentRecord::new(payment_method),
            status_history: vec![StatusEntry {
                status: OrderStatus::Pending,
                note: "Order created".to_string(),
                at: now,
            }],
            estimated_delivery: now + Duration::days(DELIVERY_LEAD_DAYS),
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.db.orders().insert(&order).await {
            let held: Vec<(&str, i64)> = order
                .items
                .iter()
                .map(|i| (i.product_id.as_str(), i.quantity))
                .collect();
            self.compensate(&held).await;
            return Err(err.into());
        }

        cart.clear();
        self.db.carts().save(&cart).await?;

        info!(
            order_number = %order.order_number,
            user_id = %user_id,
            total_cents = order.total_cents,
            "Order created"
        );

        Ok(order)
    }

    /// Loads an order by ID.
    pub async fn get(&self, order_id: &str) -> CheckoutResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str, limit: u32) -> CheckoutResult<Vec<Order>> {
        Ok(self.db.orders().list_by_user(user_id, limit).await?)
    }

    /// Applies a status transition and persists it.
    ///
    /// Transitioning to the current status is an idempotent no-op; the
    /// unchanged order is returned without touching the database.
    pub async fn update_status(
        &self,
        order_id: &str,
        to: OrderStatus,
        note: impl Into<String>,
    ) -> CheckoutResult<Order> {
        let mut order = self.get(order_id).await?;

        let before = order.status_history.len();
        let changed = order.transition(to, note, Utc::now())?;
        if changed {
            self.db
                .orders()
                .update_status(&order, &order.status_history[before..])
                .await?;
            info!(order_number = %order.order_number, status = %order.status, "Order status updated");
        }

        Ok(order)
    }

    /// Cancels an order: transitions to `Cancelled`, restores the
    /// reserved stock, and flips a completed payment to a full refund.
    ///
    /// ## Errors
    /// - `NotCancellable` when the order is already in a terminal status
    /// - `InvalidStatusTransition` when the transition table forbids the
    ///   move (a shipped order cannot be cancelled)
    pub async fn cancel(&self, order_id: &str, reason: impl Into<String>) -> CheckoutResult<Order> {
        let mut order = self.get(order_id).await?;

        if !order.status.is_cancellable() {
            return Err(CoreError::NotCancellable {
                order_id: order_id.to_string(),
                status: order.status,
            }
            .into());
        }

        let now = Utc::now();
        let before = order.status_history.len();
        order.transition(OrderStatus::Cancelled, reason, now)?;

        // Completed payments become full refunds; anything else is
        // marked abandoned.
        if order.payment.is_completed() {
            order.payment.status = keel_core::PaymentStatus::Refunded;
            order.payment.refund_amount_cents = order.payment.paid_amount_cents;
        } else {
            order.payment.status = keel_core::PaymentStatus::Cancelled;
        }

        self.db
            .orders()
            .update_status(&order, &order.status_history[before..])
            .await?;
        self.db
            .orders()
            .update_payment(&order.id, &order.payment, now)
            .await?;

        // Once the cancellation is committed, every line must get its
        // stock back even if one restore fails, so this uses the same
        // log-and-continue discipline as a failed checkout.
        let held: Vec<(&str, i64)> = order
            .items
            .iter()
            .map(|i| (i.product_id.as_str(), i.quantity))
            .collect();
        self.compensate(&held).await;

        info!(
            order_number = %order.order_number,
            refund_cents = ?order.payment.refund_amount_cents,
            "Order cancelled"
        );

        Ok(order)
    }

    async fn compensate(&self, reserved: &[(&str, i64)]) {
        for (product_id, quantity) in reserved {
            if let Err(err) = self.stock.restore(product_id, *quantity).await {
                // Nothing sane to do but log; the stock audit job picks
                // up discrepancies.
                error!(
                    product_id = %product_id,
                    quantity,
                    %err,
                    "Failed to compensate stock reservation"
                );
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keel_core::{PaymentStatus, Product};
    use keel_db::{generate_product_id, DbConfig};

    fn address() -> ShippingAddress {
        ShippingAddress {
            recipient: "Test Person".to_string(),
            line1: "1 Main St".to_string(),
            line2: None,
            city: "Springfield".to_string(),
            postal_code: "00001".to_string(),
            country: "US".to_string(),
        }
    }

    async fn seed(db: &Database, price_cents: i64, stock: i64) -> String {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: format!("SKU-{}", &generate_product_id()[..8]),
            name: "Widget".to_string(),
            price_cents,
            stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        product.id
    }

    async fn setup() -> (Database, OrderService, crate::cart_service::CartService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let orders = OrderService::new(db.clone());
        let carts = crate::cart_service::CartService::new(db.clone());
        (db, orders, carts)
    }

    #[tokio::test]
    async fn test_create_from_empty_cart() {
        let (_db, orders, _carts) = setup().await;
        let err = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err.as_business(), Some(CoreError::EmptyOrder)));
    }

    #[tokio::test]
    async fn test_create_reserves_stock_and_clears_cart() {
        let (db, orders, carts) = setup().await;
        let id = seed(&db, 5000, 10).await;
        carts.add_item("user-1", &id, 2).await.unwrap();

        let order = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.subtotal_cents, 10_000);
        assert_eq!(order.tax_cents, 1000);
        assert_eq!(order.shipping_cents, 5000);
        assert_eq!(order.total_cents, 16_000);
        assert!(order.totals_consistent());

        assert_eq!(db.products().stock_level(&id).await.unwrap(), Some(8));
        assert!(carts.get("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_fails_fast_on_shortfall() {
        let (db, orders, carts) = setup().await;
        let id = seed(&db, 5000, 1).await;
        carts.add_item("user-1", &id, 2).await.unwrap();

        let err = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_business(),
            Some(CoreError::InsufficientStock {
                available: 1,
                requested: 2,
                ..
            })
        ));

        // Nothing changed.
        assert_eq!(db.products().stock_level(&id).await.unwrap(), Some(1));
        assert!(!carts.get("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_multi_line_checkout_failure_leaves_stock_untouched() {
        let (db, orders, carts) = setup().await;
        let plenty = seed(&db, 1000, 10).await;
        let scarce = seed(&db, 1000, 5).await;

        carts.add_item("user-1", &plenty, 2).await.unwrap();
        carts.add_item("user-1", &scarce, 5).await.unwrap();

        // A second buyer drains the scarce product before checkout.
        db.products().reserve_stock(&scarce, 1).await.unwrap();

        let err = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_business(),
            Some(CoreError::InsufficientStock {
                available: 4,
                requested: 5,
                ..
            })
        ));

        // Neither line holds a reservation after the failed checkout.
        assert_eq!(db.products().stock_level(&plenty).await.unwrap(), Some(10));
        assert_eq!(db.products().stock_level(&scarce).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_compensate_restores_partial_reservations() {
        let (db, orders, _carts) = setup().await;
        let a = seed(&db, 1000, 10).await;
        let b = seed(&db, 1000, 10).await;

        db.products().reserve_stock(&a, 3).await.unwrap();
        db.products().reserve_stock(&b, 2).await.unwrap();

        orders.compensate(&[(&a, 3), (&b, 2)]).await;

        assert_eq!(db.products().stock_level(&a).await.unwrap(), Some(10));
        assert_eq!(db.products().stock_level(&b).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_update_status_happy_path_and_noop() {
        let (db, orders, carts) = setup().await;
        let id = seed(&db, 5000, 10).await;
        carts.add_item("user-1", &id, 1).await.unwrap();
        let order = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap();

        let order = orders
            .update_status(&order.id, OrderStatus::Confirmed, "Payment completed")
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.status_history.len(), 2);

        // Idempotent no-op
        let same = orders
            .update_status(&order.id, OrderStatus::Confirmed, "again")
            .await
            .unwrap();
        assert_eq!(same.status_history.len(), 2);
    }

    #[tokio::test]
    async fn test_update_status_rejects_illegal_move() {
        let (db, orders, carts) = setup().await;
        let id = seed(&db, 5000, 10).await;
        carts.add_item("user-1", &id, 1).await.unwrap();
        let order = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap();

        let err = orders
            .update_status(&order.id, OrderStatus::Shipped, "skip ahead")
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_business(),
            Some(CoreError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped,
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_restores_stock() {
        let (db, orders, carts) = setup().await;
        let id = seed(&db, 5000, 10).await;
        carts.add_item("user-1", &id, 3).await.unwrap();
        let order = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(db.products().stock_level(&id).await.unwrap(), Some(7));

        let cancelled = orders.cancel(&order.id, "Customer request").await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(cancelled.payment.status, PaymentStatus::Cancelled);
        assert_eq!(db.products().stock_level(&id).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_cancel_terminal_order_rejected() {
        let (db, orders, carts) = setup().await;
        let id = seed(&db, 5000, 10).await;
        carts.add_item("user-1", &id, 1).await.unwrap();
        let order = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap();

        orders.cancel(&order.id, "first").await.unwrap();
        let err = orders.cancel(&order.id, "second").await.unwrap_err();
        assert!(matches!(
            err.as_business(),
            Some(CoreError::NotCancellable {
                status: OrderStatus::Cancelled,
                ..
            })
        ));

        // No double restore.
        assert_eq!(db.products().stock_level(&id).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_cancel_restores_remaining_lines_when_one_restore_fails() {
        let (db, orders, carts) = setup().await;
        let doomed = seed(&db, 1000, 10).await;
        let kept = seed(&db, 1000, 10).await;

        carts.add_item("user-1", &doomed, 2).await.unwrap();
        carts.add_item("user-1", &kept, 3).await.unwrap();
        let order = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap();

        // Hard-delete one product row out from under the order; its
        // restore will fail with NotFound.
        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(&doomed)
            .execute(db.pool())
            .await
            .unwrap();

        let cancelled = orders.cancel(&order.id, "warehouse recall").await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        // The surviving line got its stock back despite the failed one.
        assert_eq!(db.products().stock_level(&kept).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_cancel_shipped_order_rejected_by_transition_table() {
        let (db, orders, carts) = setup().await;
        let id = seed(&db, 5000, 10).await;
        carts.add_item("user-1", &id, 1).await.unwrap();
        let order = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap();

        orders
            .update_status(&order.id, OrderStatus::Confirmed, "paid")
            .await
            .unwrap();
        orders
            .update_status(&order.id, OrderStatus::Processing, "packing")
            .await
            .unwrap();
        orders
            .update_status(&order.id, OrderStatus::Shipped, "in transit")
            .await
            .unwrap();

        let err = orders.cancel(&order.id, "too late").await.unwrap_err();
        assert!(matches!(
            err.as_business(),
            Some(CoreError::InvalidStatusTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled,
            })
        ));
        // Stock stays reserved for the shipped order.
        assert_eq!(db.products().stock_level(&id).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn test_order_freezes_catalog_price() {
        let (db, orders, carts) = setup().await;
        let id = seed(&db, 5000, 10).await;
        carts.add_item("user-1", &id, 1).await.unwrap();
        let order = orders
            .create("user-1", address(), PaymentMethod::Card)
            .await
            .unwrap();

        db.products()
            .update_catalog_fields(&id, "Widget", 9999)
            .await
            .unwrap();

        let loaded = orders.get(&order.id).await.unwrap();
        assert_eq!(loaded.items[0].unit_price_cents, 5000);
        assert_eq!(loaded.total_cents, order.total_cents);
    }
}
