use async_trait::async_trait;
use common::{BookId, CustomerId, Isbn, OrderId};

use crate::{Book, Customer, Order, Result};

/// Book records, looked up by id or by ISBN.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Finds a book by its internal id.
    async fn find_book(&self, id: BookId) -> Result<Option<Book>>;

    /// Finds a book by its ISBN.
    async fn find_book_by_isbn(&self, isbn: &Isbn) -> Result<Option<Book>>;

    /// Inserts or replaces a book.
    ///
    /// Fails with `Conflict` if another book already uses the ISBN.
    async fn save_book(&self, book: &Book) -> Result<()>;
}

/// Customer records, looked up by id or by email.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Finds a customer by id.
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>>;

    /// Finds a customer by email. The lookup is case-insensitive.
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>>;

    /// Inserts or replaces a customer.
    ///
    /// Fails with `Conflict` if another customer already uses the email.
    async fn save_customer(&self, customer: &Customer) -> Result<()>;
}

/// Orders together with the items they own.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Inserts an order with its items, or updates the status and the
    /// stock-returned flag of an existing one.
    ///
    /// Items are immutable once stored.
    async fn save_order(&self, order: &Order) -> Result<()>;

    /// Finds an order by id.
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Returns every order, oldest first.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Returns true if the order exists.
    async fn order_exists(&self, id: OrderId) -> Result<bool>;

    /// Deletes an order and its items. Returns false if it did not exist.
    async fn delete_order(&self, id: OrderId) -> Result<bool>;
}

/// A complete storage backend.
///
/// The record-store methods each run on their own. Anything that must be
/// atomic goes through [`Store::begin`].
#[async_trait]
pub trait Store: CatalogStore + CustomerDirectory + OrderLedger {
    /// The transactional scope type of this backend.
    type UnitOfWork: UnitOfWork;

    /// Opens a new unit of work.
    ///
    /// While a unit of work is open the caller must not use the store's own
    /// methods from the same task: the in-memory backend serializes units of
    /// work against every other access.
    async fn begin(&self) -> Result<Self::UnitOfWork>;
}

/// A transactional scope across the catalog, customers and orders.
///
/// Book lookups take an exclusive hold on the returned row until the unit of
/// work ends, so a read-check-write of a book's stock cannot interleave with
/// another unit of work touching the same book. Units of work that need
/// several books take them through [`UnitOfWork::lock_books_by_isbn`] or
/// [`UnitOfWork::lock_books`], which lock in ascending ISBN order, so two
/// units of work over overlapping books never wait on each other in a cycle.
/// Order lookups lock the order the same way. Writes stay invisible to
/// others until [`UnitOfWork::commit`]; dropping the unit of work without
/// committing discards them.
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    /// Finds a customer by email. The lookup is case-insensitive.
    async fn find_customer_by_email(&mut self, email: &str) -> Result<Option<Customer>>;

    /// Finds and locks a book by ISBN.
    async fn find_book_by_isbn(&mut self, isbn: &Isbn) -> Result<Option<Book>>;

    /// Finds and locks a book by id.
    async fn find_book(&mut self, id: BookId) -> Result<Option<Book>>;

    /// Locks every listed book that exists, in ascending ISBN order.
    ///
    /// Unknown ISBNs are skipped. Duplicates are returned once.
    async fn lock_books_by_isbn(&mut self, isbns: &[Isbn]) -> Result<Vec<Book>>;

    /// Locks every listed book that exists, in ascending ISBN order.
    ///
    /// Unknown ids are skipped. Duplicates are returned once.
    async fn lock_books(&mut self, ids: &[BookId]) -> Result<Vec<Book>>;

    /// Inserts or replaces a book.
    async fn save_book(&mut self, book: &Book) -> Result<()>;

    /// Finds and locks an order by id.
    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Inserts an order with its items, or updates the status of an existing one.
    async fn save_order(&mut self, order: &Order) -> Result<()>;

    /// Deletes an order and its items. Returns false if it did not exist.
    async fn delete_order(&mut self, id: OrderId) -> Result<bool>;

    /// Makes every write of this unit of work visible at once.
    async fn commit(self) -> Result<()>;
}
