//! # keel-core: Pure Business Logic for Keel Commerce
//!
//! This crate is the **heart** of the order workflow. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Keel Commerce Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Calling layer (HTTP routes, workers)               │   │
//! │  │        add_to_cart ──► checkout ──► payment webhooks            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  keel-checkout (services)                       │   │
//! │  │    StockLedger, CartService, OrderService, PaymentService       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                ★ keel-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │  status   │  │   │
//! │  │   │  Product  │  │   Money   │  │   Cart    │  │ OrderStatus│ │   │
//! │  │   │   Order   │  │  TaxCalc  │  │ CartItem  │  │ transitions│ │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   keel-db (Database Layer)                      │   │
//! │  │            SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, payment records, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - Cart aggregate with derived totals
//! - [`status`] - Order status state machine with an explicit transition table
//! - [`pricing`] - Pure pricing calculator (subtotal, tax, shipping, total)
//! - [`error`] - Business error taxonomy
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod status;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use keel_core::Money` instead of
// `use keel_core::money::Money`

pub use cart::{Cart, CartItem, CartSummary};
pub use error::{CoreError, CoreResult};
pub use money::Money;
pub use pricing::{OrderTotals, PricingPolicy};
pub use status::OrderStatus;
pub use types::*;

// =============================================================================
// Crate-Level Policy Constants
// =============================================================================

/// Maximum quantity of a single product across a cart line item.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 100 instead of 10)
/// and keeps a single order from draining a product's stock.
/// Configurable per-store in future versions.
pub const MAX_ITEM_QUANTITY: i64 = 99;

/// Default tax rate in basis points (1000 bps = 10%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 1000;

/// Orders with a subtotal strictly above this threshold ship for free.
pub const FREE_SHIPPING_THRESHOLD_CENTS: i64 = 50_000;

/// Flat shipping fee charged below the free-shipping threshold.
pub const FLAT_SHIPPING_CENTS: i64 = 5_000;

/// Estimated delivery lead time added to the order creation timestamp.
pub const DELIVERY_LEAD_DAYS: i64 = 7;
