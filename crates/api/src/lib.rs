//! HTTP API server for the bookstore back office.
//!
//! Provides REST endpoints under `/api/v1` for orders, books and customers,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use domain::{CatalogService, OrderPolicy, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api = Router::new()
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).delete(routes::orders::delete::<S>),
        )
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route("/books", post(routes::catalog::add_book::<S>))
        .route("/books/{isbn}", get(routes::catalog::get_book::<S>))
        .route(
            "/books/{isbn}/restock",
            post(routes::catalog::restock::<S>),
        )
        .route("/customers", post(routes::catalog::register_customer::<S>));

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1", api)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state: both services share one store.
pub fn create_state<S: Store + Clone + 'static>(store: S, policy: OrderPolicy) -> Arc<AppState<S>> {
    Arc::new(AppState {
        order_service: OrderService::with_policy(store.clone(), policy),
        catalog_service: CatalogService::new(store),
    })
}
