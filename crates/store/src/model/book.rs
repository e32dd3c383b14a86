use chrono::{DateTime, Utc};
use common::{BookId, Isbn, Money};

/// A title in the catalog with its current price and stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    /// External business key; never changes after creation.
    pub isbn: Isbn,
    pub title: String,
    pub author_name: String,
    /// Current catalog price. Orders snapshot this at creation time.
    pub price: Money,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Largest stock a book can hold; the `stock` column is a 32-bit integer.
    pub const MAX_STOCK: u32 = i32::MAX as u32;

    /// Creates a new catalog entry with a fresh id.
    pub fn new(
        isbn: Isbn,
        title: impl Into<String>,
        author_name: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Self {
        let now = super::now();
        Self {
            id: BookId::new(),
            isbn,
            title: title.into(),
            author_name: author_name.into(),
            price,
            stock,
            created_at: now,
            updated_at: now,
        }
    }

    /// Removes `quantity` units from stock.
    ///
    /// Returns false and leaves the stock untouched if fewer than `quantity`
    /// units are available.
    pub fn withdraw(&mut self, quantity: u32) -> bool {
        match self.stock.checked_sub(quantity) {
            Some(remaining) => {
                self.stock = remaining;
                self.updated_at = super::now();
                true
            }
            None => false,
        }
    }

    /// Adds `quantity` units to stock.
    ///
    /// Returns false and leaves the stock untouched if the result would
    /// exceed [`Book::MAX_STOCK`].
    pub fn restock(&mut self, quantity: u32) -> bool {
        match self
            .stock
            .checked_add(quantity)
            .filter(|total| *total <= Self::MAX_STOCK)
        {
            Some(total) => {
                self.stock = total;
                self.updated_at = super::now();
                true
            }
            None => false,
        }
    }
}
