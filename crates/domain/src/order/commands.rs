//! Order commands.

use common::Isbn;

/// One requested line: a book and how many copies of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub isbn: Isbn,
    pub quantity: u32,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(isbn: Isbn, quantity: u32) -> Self {
        Self { isbn, quantity }
    }
}

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// Email of the ordering customer. Matched case-insensitively.
    pub customer_email: String,

    /// Requested lines, processed in this order.
    pub items: Vec<OrderLine>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(customer_email: impl Into<String>, items: Vec<OrderLine>) -> Self {
        Self {
            customer_email: customer_email.into(),
            items,
        }
    }
}
