//! Persistence for the bookstore back office.
//!
//! Three record stores (catalog, customer directory, order ledger) share one
//! [`Store`] trait, which can also open a [`UnitOfWork`]: a transactional
//! scope whose writes become visible only on [`UnitOfWork::commit`] and are
//! discarded when it is dropped.
//!
//! Two backends are provided:
//! - [`InMemoryStore`] for tests and local runs
//! - [`PostgresStore`] backed by `sqlx`

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{BookId, CustomerId, Isbn, Money, OrderId, OrderItemId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryUnitOfWork};
pub use model::{Book, Customer, Order, OrderItem, OrderStatus, UnknownStatus, normalize_email};
pub use postgres::{PostgresStore, PostgresUnitOfWork};
pub use store::{CatalogStore, CustomerDirectory, OrderLedger, Store, UnitOfWork};
