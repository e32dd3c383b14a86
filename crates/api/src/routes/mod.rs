//! HTTP handlers, grouped by resource.

pub mod catalog;
pub mod health;
pub mod metrics;
pub mod orders;

use domain::{CatalogService, OrderService};
use store::Store;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub order_service: OrderService<S>,
    pub catalog_service: CatalogService<S>,
}
