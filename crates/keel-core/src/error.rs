//! # Error Types
//!
//! The business error taxonomy for keel-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  keel-core errors (this file)                                          │
//! │  └── CoreError      - Business rule violations (recoverable)           │
//! │                                                                         │
//! │  keel-db errors (separate crate)                                       │
//! │  └── DbError        - Infrastructure failures (opaque)                 │
//! │                                                                         │
//! │  keel-checkout errors                                                  │
//! │  └── CheckoutError  - Wraps both for the calling layer                 │
//! │                                                                         │
//! │  Flow: CoreError | DbError → CheckoutError → HTTP status mapping       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, quantities, statuses)
//! 3. Errors are enum variants, never String
//! 4. Business errors are never retried inside the core; retry policy
//!    belongs to the calling layer

use thiserror::Error;

use crate::status::OrderStatus;

/// Core business logic errors.
///
/// These represent expected, recoverable conditions surfaced to the
/// caller as typed failures. Each variant carries enough structured
/// context to render a precise user-facing message without re-deriving
/// anything. Infrastructure failures are NOT represented here; those
/// propagate as `keel_db::DbError`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (or is soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Order lookup miss, by id or by provider reference.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Requested quantity exceeds current stock.
    ///
    /// ## When This Occurs
    /// - Reserving stock at order creation
    /// - A concurrent reservation won the remaining units first
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Checkout attempted with no line items.
    #[error("Cannot create an order from an empty cart")]
    EmptyOrder,

    /// Cart mutation with a non-positive quantity.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// Per-product quantity cap exceeded (including after a merge).
    #[error("Quantity {requested} for {product_id} exceeds the per-product maximum ({max})")]
    QuantityLimitExceeded {
        product_id: String,
        requested: i64,
        max: i64,
    },

    /// Cart mutation referenced a product that is not in the cart.
    #[error("Product {product_id} is not in the cart")]
    ItemNotFound { product_id: String },

    /// Illegal order status change attempt.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Cancel attempted on an order in a terminal status.
    #[error("Order {order_id} is {status}, cannot cancel")]
    NotCancellable {
        order_id: String,
        status: OrderStatus,
    },

    /// Payment amount does not match the order total.
    #[error(
        "Payment mismatch for order {order_id}: expected {expected_cents} cents, \
         received {received_cents} cents"
    )]
    PaymentMismatch {
        order_id: String,
        expected_cents: i64,
        received_cents: i64,
    },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_id: "prod-42".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for prod-42: available 3, requested 5"
        );
    }

    #[test]
    fn test_transition_message_names_both_states() {
        let err = CoreError::InvalidStatusTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        };
        assert_eq!(err.to_string(), "Invalid status transition: delivered -> pending");
    }

    #[test]
    fn test_not_cancellable_message() {
        let err = CoreError::NotCancellable {
            order_id: "order-9".to_string(),
            status: OrderStatus::Delivered,
        };
        assert_eq!(err.to_string(), "Order order-9 is delivered, cannot cancel");
    }
}
