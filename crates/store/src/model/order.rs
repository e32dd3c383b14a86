use chrono::{DateTime, Utc};
use common::{BookId, CustomerId, Money, OrderId, OrderItemId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fulfillment status of an order.
///
/// Conventional flow:
/// ```text
/// Pending ──► Processing ──► Shipped ──► Delivered
///    │            │             │            │
///    └────────────┴──► Cancelled └───────────┴──► Returned
/// ```
/// Whether that flow is enforced is decided by the caller; see
/// [`OrderStatus::allowed_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, stock deducted, not yet picked up by fulfillment.
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    /// Statuses reachable from this one under the conventional flow.
    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered, OrderStatus::Returned],
            OrderStatus::Delivered => &[OrderStatus::Returned],
            OrderStatus::Cancelled | OrderStatus::Returned => &[],
        }
    }

    /// Returns true if the conventional flow allows moving to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Returns true if the conventional flow has no way out of this status.
    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Returned => "RETURNED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A line of an order.
///
/// `unit_price` is a copy of the book's price when the order was placed and
/// is never re-derived from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub book_id: BookId,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderItem {
    /// Creates a line item, computing `line_total = unit_price * quantity`.
    ///
    /// Returns None if the line total overflows.
    pub fn new(book_id: BookId, quantity: u32, unit_price: Money) -> Option<Self> {
        Some(Self {
            id: OrderItemId::new(),
            book_id,
            quantity,
            unit_price,
            line_total: unit_price.checked_mul(quantity)?,
        })
    }
}

/// An order placed by a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub items: Vec<OrderItem>,
    /// Sum of the line totals, fixed at creation.
    pub total_amount: Money,
    pub status: OrderStatus,
    /// Set once the items' quantities have been given back to the catalog.
    /// Stock is returned at most once per order.
    pub stock_returned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a pending order, computing the total from the items.
    ///
    /// Returns None if the total overflows.
    pub fn new(customer_id: CustomerId, items: Vec<OrderItem>) -> Option<Self> {
        let total_amount = items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.checked_add(item.line_total))?;
        let now = super::now();

        Some(Self {
            id: OrderId::new(),
            customer_id,
            items,
            total_amount,
            status: OrderStatus::Pending,
            stock_returned: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sets the status and bumps `updated_at`.
    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = super::now();
    }

    /// Returns true if the stored total equals the sum of
    /// `unit_price * quantity` over all items.
    pub fn total_matches_items(&self) -> bool {
        self.items
            .iter()
            .try_fold(Money::zero(), |acc, item| {
                acc.checked_add(item.unit_price.checked_mul(item.quantity)?)
            })
            .is_some_and(|sum| sum == self.total_amount)
    }
}
