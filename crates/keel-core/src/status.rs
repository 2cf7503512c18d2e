//! # Order Status State Machine
//!
//! The order lifecycle as a closed enumeration with an explicit
//! transition table. Statuses are never free-form strings, so illegal
//! transitions are a type-level certainty rather than a runtime string
//! comparison.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Order Status Transitions                           │
//! │                                                                         │
//! │   Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered ■     │
//! │      │             │             │                                      │
//! │      ├─────────────┴─────────────┴──────────► Cancelled ■              │
//! │      │             │             │                                      │
//! │      └─────────────┴─────────────┴──────────► Refunded  ■              │
//! │                                                                         │
//! │   ■ = terminal: no further transition is permitted                      │
//! │                                                                         │
//! │   Transitioning to the CURRENT status is a no-op success.               │
//! │   Everything not drawn above fails with InvalidStatusTransition.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Initial status: order persisted, stock reserved, payment pending.
    Pending,
    /// Payment completed; order accepted.
    Confirmed,
    /// Being picked and packed.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer (terminal).
    Delivered,
    /// Cancelled before shipment; stock restored (terminal).
    Cancelled,
    /// A completed payment was reversed (terminal).
    Refunded,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl OrderStatus {
    /// The explicit transition table.
    ///
    /// Returns true when moving from `self` to `next` is a legal step.
    /// Same-status moves are NOT covered here; callers treat those as
    /// idempotent no-ops before consulting the table.
    pub fn can_transition(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Pending, Refunded)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Confirmed, Refunded)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Processing, Refunded)
                | (Shipped, Delivered)
        )
    }

    /// Terminal statuses permit no further transition.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Statuses from which `cancel` may be attempted.
    ///
    /// Cancellation from `Shipped` still fails at the transition table;
    /// this guard only rejects the terminal statuses with the dedicated
    /// `NotCancellable` error for clearer user-facing messaging.
    #[inline]
    pub fn is_cancellable(self) -> bool {
        !self.is_terminal()
    }

    /// Stable lowercase name, matching the database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(Pending.can_transition(Confirmed));
        assert!(Confirmed.can_transition(Processing));
        assert!(Processing.can_transition(Shipped));
        assert!(Shipped.can_transition(Delivered));
    }

    #[test]
    fn test_cancellation_branches() {
        assert!(Pending.can_transition(Cancelled));
        assert!(Confirmed.can_transition(Cancelled));
        assert!(Processing.can_transition(Cancelled));
        // Once shipped, the order can only complete.
        assert!(!Shipped.can_transition(Cancelled));
    }

    #[test]
    fn test_refund_branches() {
        assert!(Pending.can_transition(Refunded));
        assert!(Confirmed.can_transition(Refunded));
        assert!(Processing.can_transition(Refunded));
        assert!(!Shipped.can_transition(Refunded));
        assert!(!Delivered.can_transition(Refunded));
    }

    #[test]
    fn test_terminal_states_are_dead_ends() {
        for terminal in [Delivered, Cancelled, Refunded] {
            for next in [
                Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Refunded,
            ] {
                if next != terminal {
                    assert!(
                        !terminal.can_transition(next),
                        "{terminal} -> {next} must be forbidden"
                    );
                }
            }
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn test_no_skipping_forward() {
        assert!(!Pending.can_transition(Processing));
        assert!(!Pending.can_transition(Shipped));
        assert!(!Pending.can_transition(Delivered));
        assert!(!Confirmed.can_transition(Shipped));
    }

    #[test]
    fn test_no_rewinding() {
        assert!(!Confirmed.can_transition(Pending));
        assert!(!Processing.can_transition(Confirmed));
        assert!(!Shipped.can_transition(Processing));
    }

    #[test]
    fn test_cancellable() {
        assert!(Pending.is_cancellable());
        assert!(Processing.is_cancellable());
        assert!(Shipped.is_cancellable()); // rejected later by the table
        assert!(!Delivered.is_cancellable());
        assert!(!Cancelled.is_cancellable());
        assert!(!Refunded.is_cancellable());
    }

    #[test]
    fn test_as_str_roundtrip_names() {
        assert_eq!(Pending.as_str(), "pending");
        assert_eq!(Refunded.as_str(), "refunded");
        assert_eq!(format!("{Shipped}"), "shipped");
    }
}
