use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{BookId, CustomerId, Isbn, OrderId};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    Book, Customer, Order, Result, StoreError, normalize_email,
    store::{CatalogStore, CustomerDirectory, OrderLedger, Store, UnitOfWork},
};

#[derive(Debug, Default)]
struct MemoryState {
    books: HashMap<BookId, Book>,
    isbn_index: HashMap<Isbn, BookId>,
    customers: HashMap<CustomerId, Customer>,
    email_index: HashMap<String, CustomerId>,
    // Insertion order is the listing order.
    orders: Vec<Order>,
}

impl MemoryState {
    fn book_by_isbn(&self, isbn: &Isbn) -> Option<&Book> {
        self.isbn_index.get(isbn).and_then(|id| self.books.get(id))
    }

    fn check_book(&self, book: &Book) -> Result<()> {
        match self.isbn_index.get(&book.isbn) {
            Some(existing) if *existing != book.id => Err(StoreError::Conflict(format!(
                "ISBN {} is already registered",
                book.isbn
            ))),
            _ => Ok(()),
        }
    }

    fn put_book(&mut self, book: Book) {
        if let Some(old) = self.books.get(&book.id)
            && old.isbn != book.isbn
        {
            self.isbn_index.remove(&old.isbn);
        }
        self.isbn_index.insert(book.isbn.clone(), book.id);
        self.books.insert(book.id, book);
    }

    fn check_customer(&self, customer: &Customer) -> Result<()> {
        match self.email_index.get(&normalize_email(&customer.email)) {
            Some(existing) if *existing != customer.id => Err(StoreError::Conflict(format!(
                "email {} is already registered",
                customer.email
            ))),
            _ => Ok(()),
        }
    }

    fn put_customer(&mut self, customer: Customer) {
        if let Some(old) = self.customers.get(&customer.id) {
            let old_email = normalize_email(&old.email);
            self.email_index.remove(&old_email);
        }
        self.email_index
            .insert(normalize_email(&customer.email), customer.id);
        self.customers.insert(customer.id, customer);
    }

    fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    fn put_order(&mut self, order: Order) {
        match self.orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => {
                existing.status = order.status;
                existing.stock_returned = order.stock_returned;
                existing.updated_at = order.updated_at;
            }
            None => self.orders.push(order),
        }
    }

    fn remove_order(&mut self, id: OrderId) -> bool {
        let before = self.orders.len();
        self.orders.retain(|o| o.id != id);
        self.orders.len() != before
    }
}

/// In-memory store implementation for testing and local runs.
///
/// Provides the same interface and the same isolation guarantees as the
/// PostgreSQL implementation. A unit of work holds the store's write lock
/// for its whole lifetime, so units of work run one at a time.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_book(&self, id: BookId) -> Result<Option<Book>> {
        Ok(self.state.read().await.books.get(&id).cloned())
    }

    async fn find_book_by_isbn(&self, isbn: &Isbn) -> Result<Option<Book>> {
        Ok(self.state.read().await.book_by_isbn(isbn).cloned())
    }

    async fn save_book(&self, book: &Book) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_book(book)?;
        state.put_book(book.clone());
        Ok(())
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let state = self.state.read().await;
        Ok(state
            .email_index
            .get(&normalize_email(email))
            .and_then(|id| state.customers.get(id))
            .cloned())
    }

    async fn save_customer(&self, customer: &Customer) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_customer(customer)?;
        state.put_customer(customer.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderLedger for InMemoryStore {
    async fn save_order(&self, order: &Order) -> Result<()> {
        self.state.write().await.put_order(order.clone());
        Ok(())
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.order(id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.state.read().await.orders.clone())
    }

    async fn order_exists(&self, id: OrderId) -> Result<bool> {
        Ok(self.state.read().await.order(id).is_some())
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        Ok(self.state.write().await.remove_order(id))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type UnitOfWork = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork> {
        let state = self.state.clone().write_owned().await;
        Ok(InMemoryUnitOfWork {
            state,
            books: HashMap::new(),
            orders: Vec::new(),
            deleted: HashSet::new(),
        })
    }
}

/// Unit of work over an [`InMemoryStore`].
///
/// Writes are staged next to the locked state and applied in one step on
/// commit. Dropping it releases the lock and forgets the staged writes.
pub struct InMemoryUnitOfWork {
    state: OwnedRwLockWriteGuard<MemoryState>,
    books: HashMap<BookId, Book>,
    orders: Vec<Order>,
    deleted: HashSet<OrderId>,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_customer_by_email(&mut self, email: &str) -> Result<Option<Customer>> {
        Ok(self
            .state
            .email_index
            .get(&normalize_email(email))
            .and_then(|id| self.state.customers.get(id))
            .cloned())
    }

    async fn find_book_by_isbn(&mut self, isbn: &Isbn) -> Result<Option<Book>> {
        let staged = self.books.values().find(|b| b.isbn == *isbn).map(|b| b.id);
        match staged.or_else(|| self.state.isbn_index.get(isbn).copied()) {
            Some(id) => self.find_book(id).await,
            None => Ok(None),
        }
    }

    async fn find_book(&mut self, id: BookId) -> Result<Option<Book>> {
        Ok(self
            .books
            .get(&id)
            .or_else(|| self.state.books.get(&id))
            .cloned())
    }

    async fn lock_books_by_isbn(&mut self, isbns: &[Isbn]) -> Result<Vec<Book>> {
        let mut books = Vec::with_capacity(isbns.len());
        for isbn in isbns {
            if let Some(book) = self.find_book_by_isbn(isbn).await? {
                books.push(book);
            }
        }
        Ok(sorted_by_isbn(books))
    }

    async fn lock_books(&mut self, ids: &[BookId]) -> Result<Vec<Book>> {
        let mut books = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(book) = self.find_book(*id).await? {
                books.push(book);
            }
        }
        Ok(sorted_by_isbn(books))
    }

    async fn save_book(&mut self, book: &Book) -> Result<()> {
        self.state.check_book(book)?;
        if self
            .books
            .values()
            .any(|b| b.isbn == book.isbn && b.id != book.id)
        {
            return Err(StoreError::Conflict(format!(
                "ISBN {} is already registered",
                book.isbn
            )));
        }
        self.books.insert(book.id, book.clone());
        Ok(())
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        if self.deleted.contains(&id) {
            return Ok(None);
        }
        Ok(self
            .orders
            .iter()
            .find(|o| o.id == id)
            .or_else(|| self.state.order(id))
            .cloned())
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        self.deleted.remove(&order.id);
        match self.orders.iter_mut().find(|o| o.id == order.id) {
            Some(staged) => *staged = order.clone(),
            None => self.orders.push(order.clone()),
        }
        Ok(())
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool> {
        let existed = self.find_order(id).await?.is_some();
        self.orders.retain(|o| o.id != id);
        self.deleted.insert(id);
        Ok(existed)
    }

    async fn commit(mut self) -> Result<()> {
        let books = std::mem::take(&mut self.books);
        for book in books.into_values() {
            self.state.put_book(book);
        }
        for id in std::mem::take(&mut self.deleted) {
            self.state.remove_order(id);
        }
        for order in std::mem::take(&mut self.orders) {
            self.state.put_order(order);
        }
        Ok(())
    }
}

// The write guard already excludes every other unit of work, so ordering
// only keeps the result shape the same as the database backend.
fn sorted_by_isbn(mut books: Vec<Book>) -> Vec<Book> {
    books.sort_by(|a, b| a.isbn.cmp(&b.isbn));
    books.dedup_by_key(|book| book.id);
    books
}
