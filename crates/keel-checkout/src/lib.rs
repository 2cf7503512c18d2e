//! # keel-checkout: Checkout Orchestration for Keel Commerce
//!
//! The service layer of the order workflow. Each service composes
//! keel-core's pure rules with keel-db's repositories into one
//! multi-step operation.
//!
//! ## Services
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       keel-checkout Services                            │
//! │                                                                         │
//! │  ┌───────────────┐  every stock movement in the system                 │
//! │  │  StockLedger  │  reserve (atomic gate) / restore / check            │
//! │  └───────┬───────┘                                                      │
//! │          │ used by                                                      │
//! │  ┌───────▼───────┐  cart CRUD + catalog reconciliation                 │
//! │  │  CartService  │  add / update / remove / clear / validate           │
//! │  └───────────────┘                                                      │
//! │  ┌───────────────┐  cart ──► order, status moves, cancellation         │
//! │  │ OrderService  │  create / update_status / cancel                    │
//! │  └───────────────┘                                                      │
//! │  ┌───────────────┐  provider seam + webhook reconciliation             │
//! │  │PaymentService │  start / confirm / fail / apply_webhook             │
//! │  └───────────────┘                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Model
//! Every service returns [`CheckoutResult`]. Business rejections
//! (`CheckoutError::Business`) are deterministic and user-facing;
//! database and gateway failures are opaque and possibly transient.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart_service;
pub mod error;
pub mod order_service;
pub mod payment;
pub mod stock;

// =============================================================================
// Re-exports
// =============================================================================

pub use cart_service::{CartProblem, CartService};
pub use error::{CheckoutError, CheckoutResult};
pub use order_service::OrderService;
pub use payment::{
    InMemoryGateway, PaymentEvent, PaymentEventKind, PaymentGateway, PaymentService,
};
pub use stock::StockLedger;
