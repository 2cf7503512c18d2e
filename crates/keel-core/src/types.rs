//! # Domain Types
//!
//! Core domain types for the order workflow.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Order      │   │ PaymentRecord   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  method         │       │
//! │  │  sku (business) │   │  order_number   │   │  status         │       │
//! │  │  price_cents    │   │  status         │   │  provider ref   │       │
//! │  │  stock          │   │  frozen items   │   │  paid amount    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, order_number) - human-readable, shown to users

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::status::OrderStatus;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 1000 bps = 10%.
/// Integer basis points keep tax math exact; see [`Money::calculate_tax`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// ## Stock Invariant
/// `stock` is never negative and is mutated only through the Stock
/// Ledger's atomic operations, never by direct field assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name, snapshotted into carts and orders.
    pub name: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Currently available stock.
    pub stock: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether the requested quantity is currently in stock.
    ///
    /// Read-only convenience; the authoritative check is the conditional
    /// decrement performed by the Stock Ledger at reservation time.
    pub fn covers(&self, quantity: i64) -> bool {
        self.is_active && self.stock >= quantity
    }
}

// =============================================================================
// Payment
// =============================================================================

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card captured through the payment provider.
    Card,
    /// Provider-hosted wallet checkout.
    Wallet,
    /// Cash collected at delivery time.
    CashOnDelivery,
}

/// The status of an order's payment sub-record.
///
/// Independent from [`OrderStatus`]: a failed payment leaves the order
/// `Pending` so the customer can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting capture confirmation from the provider.
    Pending,
    /// Provider confirmed the capture.
    Completed,
    /// Provider reported a failed capture.
    Failed,
    /// A completed payment was reversed in full.
    Refunded,
    /// The payment attempt was abandoned.
    Cancelled,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

/// Payment sub-record embedded in an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Chosen payment method.
    pub method: PaymentMethod,

    /// Current payment status.
    pub status: PaymentStatus,

    /// Opaque identifier from the payment provider correlating this
    /// payment attempt to the order.
    pub provider_reference: Option<String>,

    /// Amount the provider captured, in cents.
    pub paid_amount_cents: Option<i64>,

    /// When the provider confirmed the capture.
    pub paid_at: Option<DateTime<Utc>>,

    /// Amount refunded on cancellation, in cents (full refund only).
    pub refund_amount_cents: Option<i64>,
}

impl PaymentRecord {
    /// Creates a fresh pending record for the given method.
    pub fn new(method: PaymentMethod) -> Self {
        PaymentRecord {
            method,
            status: PaymentStatus::Pending,
            provider_reference: None,
            paid_amount_cents: None,
            paid_at: None,
            refund_amount_cents: None,
        }
    }

    /// Returns true once the provider has confirmed the capture.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    /// Returns the captured amount as Money, if any.
    pub fn paid_amount(&self) -> Option<Money> {
        self.paid_amount_cents.map(Money::from_cents)
    }
}

// =============================================================================
// Shipping Address
// =============================================================================

/// Shipping address snapshot frozen onto the order at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
/// Uses snapshot pattern to freeze product data at creation time:
/// later catalog price changes must not affect existing orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product being ordered.
    pub product_id: String,

    /// Product name at creation time (frozen).
    pub name_snapshot: String,

    /// Unit price in cents at creation time (frozen).
    pub unit_price_cents: i64,

    /// Quantity ordered.
    pub quantity: i64,

    /// Line total (unit_price × quantity).
    pub line_total_cents: i64,
}

impl OrderItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Status History
// =============================================================================

/// One entry in an order's append-only status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub note: String,
    pub at: DateTime<Utc>,
}

// =============================================================================
// Order
// =============================================================================

/// An immutable order snapshot plus its mutable lifecycle state.
///
/// ## What Never Changes
/// Identity (`id`, `order_number`, `user_id`, `created_at`), the frozen
/// line items, the stored totals, and the shipping address.
///
/// ## What Changes
/// `status` (through [`Order::transition`] only), the payment
/// sub-record, the lifecycle timestamps, and the append-only
/// `status_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    pub status: OrderStatus,

    /// Frozen copy of cart contents at creation time.
    pub items: Vec<OrderItem>,

    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    /// Reserved extension point; always zero today.
    pub discount_cents: i64,
    pub total_cents: i64,

    pub shipping_address: ShippingAddress,
    pub payment: PaymentRecord,

    /// Append-only audit trail of status transitions.
    pub status_history: Vec<StatusEntry>,

    pub estimated_delivery: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Checks the stored-totals invariant:
    /// `total == subtotal + tax + shipping − discount`.
    pub fn totals_consistent(&self) -> bool {
        self.total_cents
            == self.subtotal_cents + self.tax_cents + self.shipping_cents - self.discount_cents
    }

    /// Returns true if the order is in a terminal status.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a status transition.
    ///
    /// Returns `Ok(false)` without touching anything when `to` equals the
    /// current status (idempotent no-op). Otherwise validates the move
    /// against the transition table, appends a history entry, stamps
    /// `delivered_at`/`cancelled_at` on entering those states, and
    /// returns `Ok(true)`.
    pub fn transition(
        &mut self,
        to: OrderStatus,
        note: impl Into<String>,
        at: DateTime<Utc>,
    ) -> crate::error::CoreResult<bool> {
        if to == self.status {
            return Ok(false);
        }

        if !self.status.can_transition(to) {
            return Err(crate::error::CoreError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }

        self.status = to;
        self.status_history.push(StatusEntry {
            status: to,
            note: note.into(),
            at,
        });

        match to {
            OrderStatus::Delivered => self.delivered_at = Some(at),
            OrderStatus::Cancelled => self.cancelled_at = Some(at),
            _ => {}
        }

        self.updated_at = at;
        Ok(true)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
