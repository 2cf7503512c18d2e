//! # Checkout Error Types
//!
//! The service layer surfaces two error families to callers: business
//! rule violations from keel-core (recoverable, user-facing) and
//! infrastructure failures from keel-db (opaque, retryable). Both are
//! kept distinguishable so the calling layer can map them to different
//! response codes.

use thiserror::Error;

use keel_core::CoreError;
use keel_db::DbError;

/// Errors surfaced by the checkout services.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Business(#[from] CoreError),

    /// The database layer failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// The payment gateway rejected or failed a call.
    #[error("Payment gateway error: {0}")]
    Gateway(String),
}

impl CheckoutError {
    /// Returns the business error, if this is one.
    pub fn as_business(&self) -> Option<&CoreError> {
        match self {
            CheckoutError::Business(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the caller may retry the operation unchanged.
    ///
    /// Business rejections are deterministic; retrying without changing
    /// the request cannot succeed. Infrastructure and gateway failures
    /// may be transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CheckoutError::Business(_))
    }
}

/// Result type for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

// =============================================================================
// Unit Tests
// =============================================================================
