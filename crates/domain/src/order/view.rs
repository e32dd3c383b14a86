//! Read model returned by the order workflow.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{BookId, Isbn, Money, OrderId, OrderItemId};
use serde::{Deserialize, Serialize};
use store::{Book, Order, OrderStatus, Store, StoreError};

use crate::error::DomainError;

/// An order line with the book it refers to spelled out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub id: OrderItemId,
    pub book_id: BookId,
    pub book_isbn: Isbn,
    pub book_title: String,
    pub book_author_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// An order with its customer and books resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub customer_email: String,
    pub customer_full_name: String,
    pub items: Vec<OrderItemView>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    /// Resolves the customer and every referenced book of `order`.
    ///
    /// Titles and authors are read from the catalog as it is now; prices and
    /// quantities come from the order itself.
    pub(crate) async fn load<S: Store>(store: &S, order: Order) -> Result<Self, DomainError> {
        let customer = store
            .find_customer(order.customer_id)
            .await?
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "order {} references missing customer {}",
                    order.id, order.customer_id
                ))
            })?;

        let mut books: HashMap<BookId, Book> = HashMap::new();
        let mut items = Vec::with_capacity(order.items.len());
        for item in order.items {
            if !books.contains_key(&item.book_id) {
                let book = store.find_book(item.book_id).await?.ok_or_else(|| {
                    StoreError::Corrupt(format!(
                        "order {} references missing book {}",
                        order.id, item.book_id
                    ))
                })?;
                books.insert(item.book_id, book);
            }
            let book = &books[&item.book_id];

            items.push(OrderItemView {
                id: item.id,
                book_id: item.book_id,
                book_isbn: book.isbn.clone(),
                book_title: book.title.clone(),
                book_author_name: book.author_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total,
            });
        }

        Ok(Self {
            id: order.id,
            customer_email: customer.email,
            customer_full_name: customer.full_name,
            items,
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }

    /// Sum of copies across all lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}
