//! # Payment Reconciliation
//!
//! The seam between orders and the payment provider, plus the webhook
//! reconciliation logic that keeps the two in sync.
//!
//! ## Reconciliation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Payment Reconciliation                               │
//! │                                                                         │
//! │  start()         gateway.create_intent ──► provider ref stored on      │
//! │                  the order (payment stays Pending)                      │
//! │                                                                         │
//! │  provider ──► webhook event ──► apply_webhook()                         │
//! │                  │                                                      │
//! │                  ├── amount ≠ order total ──► PaymentMismatch          │
//! │                  ├── Succeeded ──► payment Completed; order advances    │
//! │                  │                 Pending → Confirmed only if still    │
//! │                  │                 Pending (late captures keep status)  │
//! │                  └── Failed ────► payment Failed unless already         │
//! │                                   Completed/Refunded (stale retry)      │
//! │                                                                         │
//! │  Duplicate Succeeded events are no-ops: reconciliation is keyed on      │
//! │  the payment already being Completed, not on event identity.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CheckoutError, CheckoutResult};
use keel_core::{CoreError, Order, OrderStatus, PaymentStatus};
use keel_db::Database;

// =============================================================================
// Gateway Seam
// =============================================================================

/// Abstraction over the payment provider.
///
/// Implementations talk to the real provider; tests use
/// [`InMemoryGateway`]. The gateway never touches order state - it only
/// creates and confirms payment intents.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for the given amount and returns the
    /// provider's reference for it.
    async fn create_intent(&self, order_id: &str, amount_cents: i64) -> CheckoutResult<String>;

    /// Asks the provider to capture the intent.
    async fn confirm(&self, reference: &str) -> CheckoutResult<()>;
}

/// In-memory gateway for tests and local development.
///
/// References are deterministic (`pi_<order_id>`); `failing()` makes
/// every call error to exercise failure paths.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    fail: bool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        InMemoryGateway { fail: false }
    }

    pub fn failing() -> Self {
        InMemoryGateway { fail: true }
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_intent(&self, order_id: &str, _amount_cents: i64) -> CheckoutResult<String> {
        if self.fail {
            return Err(CheckoutError::Gateway("provider unavailable".to_string()));
        }
        Ok(format!("pi_{order_id}"))
    }

    async fn confirm(&self, _reference: &str) -> CheckoutResult<()> {
        if self.fail {
            return Err(CheckoutError::Gateway("provider unavailable".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Webhook Events
// =============================================================================

/// Outcome reported by a provider webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    Succeeded,
    Failed,
}

/// A payment event delivered by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Provider reference correlating the event to an order.
    pub reference: String,
    /// What happened.
    pub kind: PaymentEventKind,
    /// Captured amount in cents, when the provider reports one.
    pub amount_cents: Option<i64>,
}

// =============================================================================
// Payment Service
// =============================================================================

/// Service reconciling provider payment state with order state.
pub struct PaymentService<G: PaymentGateway> {
    db: Database,
    gateway: G,
}

impl<G: PaymentGateway> PaymentService<G> {
    /// Creates a new PaymentService.
    pub fn new(db: Database, gateway: G) -> Self {
        PaymentService { db, gateway }
    }

    /// Starts payment for an order: creates a provider intent and stores
    /// its reference on the order. The payment record stays `Pending`
    /// until the provider confirms.
    pub async fn start(&self, order_id: &str) -> CheckoutResult<String> {
        let mut order = self.load(order_id).await?;

        let reference = self
            .gateway
            .create_intent(&order.id, order.total_cents)
            .await?;

        order.payment.provider_reference = Some(reference.clone());
        self.db
            .orders()
            .update_payment(&order.id, &order.payment, Utc::now())
            .await?;

        info!(order_number = %order.order_number, reference = %reference, "Payment intent created");
        Ok(reference)
    }

    /// Marks an order's payment as completed, advancing the order to
    /// `Confirmed` when it is still `Pending`.
    ///
    /// ## Behavior
    /// - Already completed: `Ok(false)`, no side effects
    /// - Order has moved past `Pending` (admin-confirmed, processing,
    ///   cancelled): the capture is still recorded on the payment
    ///   sub-record, the order status is left alone
    ///
    /// The capture is persisted before any status move, so a late
    /// provider confirmation never gets lost to a status conflict.
    pub async fn confirm(&self, order_id: &str) -> CheckoutResult<bool> {
        let mut order = self.load(order_id).await?;

        if order.payment.is_completed() {
            return Ok(false);
        }

        let now = Utc::now();
        order.payment.status = PaymentStatus::Completed;
        order.payment.paid_amount_cents = Some(order.total_cents);
        order.payment.paid_at = Some(now);

        self.db
            .orders()
            .update_payment(&order.id, &order.payment, now)
            .await?;

        if order.status == OrderStatus::Pending {
            let before = order.status_history.len();
            order.transition(OrderStatus::Confirmed, "Payment completed", now)?;
            self.db
                .orders()
                .update_status(&order, &order.status_history[before..])
                .await?;
        }

        info!(order_number = %order.order_number, status = %order.status, "Payment confirmed");
        Ok(true)
    }

    /// Records a failed payment attempt. The order stays `Pending` so
    /// the customer can retry with another method.
    ///
    /// A failure delivered after the payment completed (or was
    /// refunded) is a stale retry and is ignored, mirroring the
    /// already-completed no-op in [`Self::confirm`].
    pub async fn fail(&self, order_id: &str) -> CheckoutResult<bool> {
        let mut order = self.load(order_id).await?;

        if matches!(
            order.payment.status,
            PaymentStatus::Completed | PaymentStatus::Refunded
        ) {
            warn!(
                order_number = %order.order_number,
                payment_status = ?order.payment.status,
                "Ignoring stale payment failure"
            );
            return Ok(false);
        }

        order.payment.status = PaymentStatus::Failed;
        self.db
            .orders()
            .update_payment(&order.id, &order.payment, Utc::now())
            .await?;

        warn!(order_number = %order.order_number, "Payment failed");
        Ok(true)
    }

    /// Applies a provider webhook event.
    ///
    /// ## Behavior
    /// - Unknown reference fails with `OrderNotFound`
    /// - A reported amount that differs from the order total fails with
    ///   `PaymentMismatch` and changes nothing
    /// - `Succeeded` confirms the payment (idempotently); `Failed`
    ///   records the failure
    ///
    /// Returns `true` when order state changed.
    pub async fn apply_webhook(&self, event: &PaymentEvent) -> CheckoutResult<bool> {
        let order = self
            .db
            .orders()
            .get_by_provider_reference(&event.reference)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(event.reference.clone()))?;

        if let Some(amount) = event.amount_cents {
            if amount != order.total_cents {
                warn!(
                    order_number = %order.order_number,
                    expected = order.total_cents,
                    received = amount,
                    "Webhook amount mismatch"
                );
                return Err(CoreError::PaymentMismatch {
                    order_id: order.id.clone(),
                    expected_cents: order.total_cents,
                    received_cents: amount,
                }
                .into());
            }
        }

        match event.kind {
            PaymentEventKind::Succeeded => self.confirm(&order.id).await,
            PaymentEventKind::Failed => self.fail(&order.id).await,
        }
    }

    async fn load(&self, order_id: &str) -> CheckoutResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart_service::CartService;
    use crate::order_service::OrderService;
    use chrono::Utc;
    use keel_core::{PaymentMethod, Product, ShippingAddress};
    use keel_db::{generate_product_id, DbConfig};

    async fn setup_with_order() -> (Database, PaymentService<InMemoryGateway>, Order) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: "SKU-1".to_string(),
            name: "Widget".to_string(),
            price_cents: 5000,
            stock: 10,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();

        let carts = CartService::new(db.clone());
        carts.add_item("user-1", &product.id, 2).await.unwrap();

        let order = OrderService::new(db.clone())
            .create(
                "user-1",
                ShippingAddress {
                    recipient: "Test Person".to_string(),
                    line1: "1 Main St".to_string(),
                    line2: None,
                    city: "Springfield".to_string(),
                    postal_code: "00001".to_string(),
                    country: "US".to_string(),
                },
                PaymentMethod::Card,
            )
            .await
            .unwrap();

        let payments = PaymentService::new(db.clone(), InMemoryGateway::new());
        (db, payments, order)
    }

    #[tokio::test]
    async fn test_start_stores_provider_reference() {
        let (db, payments, order) = setup_with_order().await;

        let reference = payments.start(&order.id).await.unwrap();
        assert_eq!(reference, format!("pi_{}", order.id));

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.payment.provider_reference, Some(reference));
        assert_eq!(loaded.payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let (db, payments, order) = setup_with_order().await;

        assert!(payments.confirm(&order.id).await.unwrap());
        assert!(!payments.confirm(&order.id).await.unwrap());

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Confirmed);
        assert!(loaded.payment.is_completed());
        assert_eq!(loaded.payment.paid_amount_cents, Some(order.total_cents));
        // Only one "Payment completed" history entry.
        assert_eq!(loaded.status_history.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_payment_keeps_order_pending() {
        let (db, payments, order) = setup_with_order().await;

        assert!(payments.fail(&order.id).await.unwrap());

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(loaded.payment.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_confirm_on_advanced_order_records_capture_only() {
        let (db, payments, order) = setup_with_order().await;

        // Admin confirms and starts fulfilment before the provider's
        // confirmation arrives.
        let orders = OrderService::new(db.clone());
        orders
            .update_status(&order.id, OrderStatus::Confirmed, "manual confirm")
            .await
            .unwrap();
        orders
            .update_status(&order.id, OrderStatus::Processing, "packing")
            .await
            .unwrap();

        assert!(payments.confirm(&order.id).await.unwrap());

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        // The capture is recorded; the order keeps its further-along status.
        assert!(loaded.payment.is_completed());
        assert_eq!(loaded.payment.paid_amount_cents, Some(order.total_cents));
        assert!(loaded.payment.paid_at.is_some());
        assert_eq!(loaded.status, OrderStatus::Processing);
        // No "Payment completed" history entry was forced in.
        assert_eq!(loaded.status_history.len(), 3);
    }

    #[tokio::test]
    async fn test_stale_failure_after_success_is_ignored() {
        let (db, payments, order) = setup_with_order().await;
        let reference = payments.start(&order.id).await.unwrap();

        payments
            .apply_webhook(&PaymentEvent {
                reference: reference.clone(),
                kind: PaymentEventKind::Succeeded,
                amount_cents: Some(order.total_cents),
            })
            .await
            .unwrap();

        // A delayed Failed retry for the same intent arrives afterwards.
        let changed = payments
            .apply_webhook(&PaymentEvent {
                reference,
                kind: PaymentEventKind::Failed,
                amount_cents: None,
            })
            .await
            .unwrap();
        assert!(!changed);

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.payment.status, PaymentStatus::Completed);
        assert_eq!(loaded.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_webhook_succeeded_confirms_order() {
        let (db, payments, order) = setup_with_order().await;
        let reference = payments.start(&order.id).await.unwrap();

        let changed = payments
            .apply_webhook(&PaymentEvent {
                reference: reference.clone(),
                kind: PaymentEventKind::Succeeded,
                amount_cents: Some(order.total_cents),
            })
            .await
            .unwrap();
        assert!(changed);

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Confirmed);

        // Duplicate delivery is a no-op.
        let changed = payments
            .apply_webhook(&PaymentEvent {
                reference,
                kind: PaymentEventKind::Succeeded,
                amount_cents: Some(order.total_cents),
            })
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_webhook_amount_mismatch() {
        let (db, payments, order) = setup_with_order().await;
        let reference = payments.start(&order.id).await.unwrap();

        let err = payments
            .apply_webhook(&PaymentEvent {
                reference,
                kind: PaymentEventKind::Succeeded,
                amount_cents: Some(order.total_cents - 1),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_business(),
            Some(CoreError::PaymentMismatch { .. })
        ));

        // Nothing changed.
        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(loaded.payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_webhook_unknown_reference() {
        let (_db, payments, _order) = setup_with_order().await;

        let err = payments
            .apply_webhook(&PaymentEvent {
                reference: "pi_unknown".to_string(),
                kind: PaymentEventKind::Succeeded,
                amount_cents: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_business(),
            Some(CoreError::OrderNotFound(_))
        ));
    }

    #[test]
    fn test_webhook_payload_parses() {
        let event: PaymentEvent = serde_json::from_str(
            r#"{"reference": "pi_abc", "kind": "succeeded", "amount_cents": 16000}"#,
        )
        .unwrap();
        assert_eq!(event.reference, "pi_abc");
        assert_eq!(event.kind, PaymentEventKind::Succeeded);
        assert_eq!(event.amount_cents, Some(16_000));

        // Providers omit the amount on failure events.
        let event: PaymentEvent =
            serde_json::from_str(r#"{"reference": "pi_abc", "kind": "failed"}"#).unwrap();
        assert_eq!(event.kind, PaymentEventKind::Failed);
        assert_eq!(event.amount_cents, None);
    }

    #[tokio::test]
    async fn test_gateway_failure_surfaces() {
        let (db, _payments, order) = setup_with_order().await;
        let failing = PaymentService::new(db, InMemoryGateway::failing());

        let err = failing.start(&order.id).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Gateway(_)));
        assert!(err.is_retryable());
    }
}
