//! Shared identifiers and value types.
//!
//! Everything here is storage-agnostic and used by every other crate in the
//! workspace: typed UUID identifiers, the [`Money`] fixed-point amount and the
//! [`Isbn`] business key.

mod ids;
mod isbn;
mod money;

pub use ids::{BookId, CustomerId, OrderId, OrderItemId};
pub use isbn::{Isbn, IsbnError};
pub use money::{Money, MoneyError};
