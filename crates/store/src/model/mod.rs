//! Records held by the stores.
//!
//! Records reference each other by id only. An [`Order`] owns its
//! [`OrderItem`]s; books and customers are looked up on demand.

mod book;
mod customer;
mod order;

pub use book::Book;
pub use customer::{Customer, normalize_email};
pub use order::{Order, OrderItem, OrderStatus, UnknownStatus};

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to the microsecond precision PostgreSQL stores.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
