//! # Pricing Calculator
//!
//! Pure order-total computation: no side effects, no I/O, deterministic
//! given its inputs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Pricing Pipeline                                  │
//! │                                                                         │
//! │  line items ──► subtotal = Σ (quantity × unit price)                   │
//! │                     │                                                   │
//! │                     ├──► tax      = subtotal × tax rate                │
//! │                     ├──► shipping = 0 above threshold, else flat fee   │
//! │                     ├──► discount = 0 (reserved extension point)       │
//! │                     │                                                   │
//! │                     └──► total = subtotal + tax + shipping − discount  │
//! │                                                                         │
//! │  All amounts are integer cents, so the 2-decimal rounding              │
//! │  requirement holds exactly; only the tax multiplication rounds.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{OrderItem, TaxRate};
use crate::{FLAT_SHIPPING_CENTS, FREE_SHIPPING_THRESHOLD_CENTS};

/// Policy constants feeding the calculator.
///
/// Defaults come from the crate-level constants; stores with different
/// tax or shipping policy construct their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Tax rate applied to the subtotal.
    pub tax_rate: TaxRate,

    /// Orders with a subtotal strictly above this ship for free.
    pub free_shipping_threshold: Money,

    /// Flat shipping fee charged below the threshold.
    pub flat_shipping: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy {
            tax_rate: TaxRate::default(),
            free_shipping_threshold: Money::from_cents(FREE_SHIPPING_THRESHOLD_CENTS),
            flat_shipping: Money::from_cents(FLAT_SHIPPING_CENTS),
        }
    }
}

/// Computed order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    /// Always zero; coupon application is deliberately unimplemented.
    pub discount: Money,
    pub total: Money,
}

impl PricingPolicy {
    /// Computes totals for a set of frozen line items.
    pub fn price(&self, items: &[OrderItem]) -> OrderTotals {
        let subtotal: Money = items
            .iter()
            .map(OrderItem::line_total)
            .fold(Money::zero(), |acc, line| acc + line);

        let tax = subtotal.calculate_tax(self.tax_rate);

        let shipping = if subtotal > self.free_shipping_threshold {
            Money::zero()
        } else {
            self.flat_shipping
        };

        let discount = Money::zero();

        OrderTotals {
            subtotal,
            tax,
            shipping,
            discount,
            total: subtotal + tax + shipping - discount,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
