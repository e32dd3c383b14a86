//! Domain layer for the bookstore back office.
//!
//! This crate provides the services that sit on top of a [`store::Store`]:
//! - [`OrderService`] places orders, moves them through their status
//!   lifecycle, reads and deletes them
//! - [`CatalogService`] registers books and customers and restocks books
//!
//! Both are generic over the storage backend and return [`DomainError`].

pub mod catalog;
pub mod error;
pub mod order;

pub use catalog::{CatalogService, NewBook, NewCustomer};
pub use error::DomainError;
pub use order::{
    CreateOrder, OrderError, OrderItemView, OrderLine, OrderPolicy, OrderService, OrderView,
    TransitionPolicy, UnknownPolicy,
};
