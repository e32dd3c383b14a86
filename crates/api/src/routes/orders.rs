//! Order placement, lookup, status and deletion endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Isbn, OrderId};
use domain::{CreateOrder, OrderLine, OrderView};
use serde::Deserialize;
use store::{OrderStatus, Store};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_email: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub book_isbn: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: OrderStatus,
}

impl CreateOrderRequest {
    fn into_command(self) -> Result<CreateOrder, ApiError> {
        let items = self
            .items
            .into_iter()
            .map(|item| {
                let isbn = Isbn::parse(&item.book_isbn)
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                Ok(OrderLine::new(isbn, item.quantity))
            })
            .collect::<Result<Vec<_>, ApiError>>()?;
        Ok(CreateOrder::new(self.customer_email, items))
    }
}

// -- Handlers --

/// POST /api/v1/orders: place a new order.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let Json(req) = payload?;
    let view = state
        .order_service
        .create_order(req.into_command()?)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/orders: list every order, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    Ok(Json(state.order_service.list_orders().await?))
}

/// GET /api/v1/orders/{id}: load one order.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.order_service.find_order(order_id).await?))
}

/// PATCH /api/v1/orders/{id}/status?status=SHIPPED: change the status.
#[tracing::instrument(skip(state, query))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let Query(StatusQuery { status }) = query?;
    Ok(Json(
        state.order_service.update_status(order_id, status).await?,
    ))
}

/// DELETE /api/v1/orders/{id}: delete an order and its items.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id = parse_order_id(&id)?;
    state.order_service.delete_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
