//! Catalog and customer registration.
//!
//! These are the write paths that feed the order workflow: books must be in
//! the catalog and customers registered before an order can reference them.

use common::{BookId, Isbn, Money};
use store::{Book, Customer, Store, StoreError, UnitOfWork};

use crate::error::DomainError;
use crate::order::OrderError;

// Column widths of the catalog and customer tables.
const MAX_TITLE_LEN: usize = 200;
const MAX_AUTHOR_LEN: usize = 150;
const MAX_EMAIL_LEN: usize = 100;
const MAX_FULL_NAME_LEN: usize = 150;

/// A book to add to the catalog.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub isbn: Isbn,
    pub title: String,
    pub author_name: String,
    pub price: Money,
    pub stock: u32,
}

/// A customer to register.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub email: String,
    pub full_name: String,
    /// Already hashed by the caller.
    pub credential_hash: String,
}

/// Service for the catalog and the customer directory.
#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    /// Creates a new catalog service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a book to the catalog.
    #[tracing::instrument(skip(self), fields(isbn = %book.isbn))]
    pub async fn add_book(&self, book: NewBook) -> Result<Book, DomainError> {
        if !book.price.is_positive() {
            return Err(OrderError::InvalidRequest(format!(
                "price must be greater than zero, got {}",
                book.price
            ))
            .into());
        }
        if book.title.trim().is_empty() {
            return Err(OrderError::InvalidRequest("title must not be blank".into()).into());
        }
        check_len("title", &book.title, MAX_TITLE_LEN)?;
        check_len("author_name", &book.author_name, MAX_AUTHOR_LEN)?;
        if book.stock > Book::MAX_STOCK {
            return Err(OrderError::InvalidRequest(format!(
                "stock must be at most {}, got {}",
                Book::MAX_STOCK,
                book.stock
            ))
            .into());
        }
        if self.store.find_book_by_isbn(&book.isbn).await?.is_some() {
            return Err(OrderError::DuplicateIsbn(book.isbn).into());
        }

        let record = Book::new(
            book.isbn,
            book.title.trim(),
            book.author_name.trim(),
            book.price,
            book.stock,
        );
        match self.store.save_book(&record).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(OrderError::DuplicateIsbn(record.isbn).into());
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(book_id = %record.id, stock = record.stock, "book added");
        Ok(record)
    }

    /// Looks up a book by ISBN.
    #[tracing::instrument(skip(self))]
    pub async fn book_by_isbn(&self, isbn: &Isbn) -> Result<Book, DomainError> {
        self.store
            .find_book_by_isbn(isbn)
            .await?
            .ok_or_else(|| OrderError::BookNotFound(isbn.to_string()).into())
    }

    /// Looks up a book by id.
    #[tracing::instrument(skip(self))]
    pub async fn book(&self, id: BookId) -> Result<Book, DomainError> {
        self.store
            .find_book(id)
            .await?
            .ok_or_else(|| OrderError::BookNotFound(id.to_string()).into())
    }

    /// Adds copies of a book to its stock.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, isbn: &Isbn, quantity: u32) -> Result<Book, DomainError> {
        if quantity == 0 {
            return Err(
                OrderError::InvalidRequest("restock quantity must be at least 1".into()).into(),
            );
        }

        let mut uow = self.store.begin().await?;
        let mut book = uow
            .find_book_by_isbn(isbn)
            .await?
            .ok_or_else(|| OrderError::BookNotFound(isbn.to_string()))?;
        if !book.restock(quantity) {
            return Err(OrderError::InvalidRequest(format!(
                "adding {} copies would exceed the maximum stock of ISBN {}",
                quantity, isbn
            ))
            .into());
        }
        uow.save_book(&book).await?;
        uow.commit().await?;

        tracing::info!(book_id = %book.id, stock = book.stock, "book restocked");
        Ok(book)
    }

    /// Registers a customer.
    #[tracing::instrument(skip(self, customer))]
    pub async fn register_customer(&self, customer: NewCustomer) -> Result<Customer, DomainError> {
        let email = customer.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(OrderError::InvalidRequest(format!("invalid email: {email}")).into());
        }
        check_len("email", email, MAX_EMAIL_LEN)?;
        check_len("full_name", &customer.full_name, MAX_FULL_NAME_LEN)?;
        if self.store.find_customer_by_email(email).await?.is_some() {
            return Err(OrderError::DuplicateEmail(email.to_lowercase()).into());
        }

        let record = Customer::new(email, customer.full_name.trim(), customer.credential_hash);
        match self.store.save_customer(&record).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(OrderError::DuplicateEmail(record.email).into());
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(customer_id = %record.id, "customer registered");
        Ok(record)
    }

    /// Looks up a customer by email, case-insensitively.
    #[tracing::instrument(skip(self))]
    pub async fn customer_by_email(&self, email: &str) -> Result<Customer, DomainError> {
        self.store
            .find_customer_by_email(email)
            .await?
            .ok_or_else(|| OrderError::CustomerNotFound(email.to_string()).into())
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), OrderError> {
    if value.trim().chars().count() > max {
        return Err(OrderError::InvalidRequest(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryStore;

    fn new_book(stock: u32) -> NewBook {
        NewBook {
            isbn: Isbn::parse("978-0545010221").unwrap(),
            title: "Harry Potter and the Deathly Hallows".to_string(),
            author_name: "J. K. Rowling".to_string(),
            price: Money::from_cents(2999),
            stock,
        }
    }

    fn new_customer(email: &str) -> NewCustomer {
        NewCustomer {
            email: email.to_string(),
            full_name: "Avid Reader".to_string(),
            credential_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_and_find_book() {
        let service = CatalogService::new(InMemoryStore::new());
        let book = service.add_book(new_book(5)).await.unwrap();

        assert_eq!(service.book_by_isbn(&book.isbn).await.unwrap(), book);
        assert_eq!(service.book(book.id).await.unwrap(), book);
    }

    #[tokio::test]
    async fn test_duplicate_isbn() {
        let service = CatalogService::new(InMemoryStore::new());
        service.add_book(new_book(5)).await.unwrap();

        let err = service.add_book(new_book(1)).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::DuplicateIsbn(_))
        ));
    }

    #[tokio::test]
    async fn test_non_positive_price_is_rejected() {
        let service = CatalogService::new(InMemoryStore::new());
        let mut book = new_book(5);
        book.price = Money::zero();

        let err = service.add_book(book).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_overlong_title_is_rejected() {
        let service = CatalogService::new(InMemoryStore::new());
        let mut book = new_book(5);
        book.title = "x".repeat(MAX_TITLE_LEN + 1);

        let err = service.add_book(book).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_restock() {
        let service = CatalogService::new(InMemoryStore::new());
        let book = service.add_book(new_book(5)).await.unwrap();

        let restocked = service.restock(&book.isbn, 7).await.unwrap();
        assert_eq!(restocked.stock, 12);
        assert_eq!(service.book(book.id).await.unwrap().stock, 12);
    }

    #[tokio::test]
    async fn test_stock_above_limit_is_rejected() {
        let service = CatalogService::new(InMemoryStore::new());

        let err = service.add_book(new_book(u32::MAX)).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidRequest(_))
        ));

        let book = service.add_book(new_book(Book::MAX_STOCK)).await.unwrap();
        let err = service.restock(&book.isbn, 1).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidRequest(_))
        ));
        assert_eq!(service.book(book.id).await.unwrap().stock, Book::MAX_STOCK);
    }

    #[tokio::test]
    async fn test_restock_unknown_book() {
        let service = CatalogService::new(InMemoryStore::new());
        let isbn = Isbn::parse("9780306406157").unwrap();

        let err = service.restock(&isbn, 1).await.unwrap_err();
        assert_eq!(
            err.as_order_error(),
            Some(&OrderError::BookNotFound("9780306406157".to_string()))
        );
    }

    #[tokio::test]
    async fn test_register_and_find_customer() {
        let service = CatalogService::new(InMemoryStore::new());
        let customer = service
            .register_customer(new_customer("Reader@Example.com"))
            .await
            .unwrap();
        assert_eq!(customer.email, "reader@example.com");

        let found = service.customer_by_email("READER@example.com").await.unwrap();
        assert_eq!(found.id, customer.id);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let service = CatalogService::new(InMemoryStore::new());
        service
            .register_customer(new_customer("reader@example.com"))
            .await
            .unwrap();

        let err = service
            .register_customer(new_customer("READER@example.com"))
            .await
            .unwrap_err();
        assert_eq!(
            err.as_order_error(),
            Some(&OrderError::DuplicateEmail("reader@example.com".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let service = CatalogService::new(InMemoryStore::new());
        let err = service.customer_by_email("ghost@example.com").await.unwrap_err();
        assert!(err.as_order_error().is_some_and(OrderError::is_not_found));
    }
}
