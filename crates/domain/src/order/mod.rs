//! Order placement, status lifecycle and order views.

mod commands;
mod policy;
mod service;
mod view;

pub use commands::{CreateOrder, OrderLine};
pub use policy::{OrderPolicy, TransitionPolicy, UnknownPolicy};
pub use service::OrderService;
pub use view::{OrderItemView, OrderView};

use common::Isbn;
use store::OrderStatus;
use thiserror::Error;

/// Business errors raised by the order workflow and the catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// No customer is registered under the given email.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// No book matches the given ISBN or id.
    #[error("Book not found: {0}")]
    BookNotFound(String),

    /// No order exists with the given id.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The request is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A line asks for more copies than are in stock.
    #[error(
        "Insufficient stock for '{title}' (ISBN {isbn}): available {available}, requested {requested}"
    )]
    InsufficientStock {
        isbn: Isbn,
        title: String,
        available: u32,
        requested: u32,
    },

    /// The status policy forbids this move.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// A book with this ISBN is already registered.
    #[error("A book with ISBN {0} already exists")]
    DuplicateIsbn(Isbn),

    /// A customer with this email is already registered.
    #[error("A customer with email {0} already exists")]
    DuplicateEmail(String),
}

impl OrderError {
    /// Short machine-readable label, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::CustomerNotFound(_) => "customer_not_found",
            OrderError::BookNotFound(_) => "book_not_found",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::InvalidRequest(_) => "invalid_request",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InvalidStatusTransition { .. } => "invalid_status_transition",
            OrderError::DuplicateIsbn(_) => "duplicate_isbn",
            OrderError::DuplicateEmail(_) => "duplicate_email",
        }
    }

    /// Returns true for the errors that mean a referenced record is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OrderError::CustomerNotFound(_)
                | OrderError::BookNotFound(_)
                | OrderError::OrderNotFound(_)
        )
    }
}
