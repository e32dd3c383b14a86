//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Order(OrderError),

    /// The storage backend failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}

impl DomainError {
    /// Short machine-readable label, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            DomainError::Order(e) => e.reason(),
            DomainError::Store(_) => "store",
        }
    }

    /// Returns the business error, if this is one.
    pub fn as_order_error(&self) -> Option<&OrderError> {
        match self {
            DomainError::Order(e) => Some(e),
            DomainError::Store(_) => None,
        }
    }
}
