//! Book and customer endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{BookId, CustomerId, Isbn, Money};
use domain::{NewBook, NewCustomer};
use serde::{Deserialize, Serialize};
use store::{Book, Customer, Store};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub isbn: String,
    pub title: String,
    pub author_name: String,
    /// Decimal string, e.g. `"29.99"`.
    pub price: Money,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub email: String,
    pub full_name: String,
    pub credential_hash: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub id: BookId,
    pub isbn: Isbn,
    pub title: String,
    pub author_name: String,
    pub price: Money,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            isbn: book.isbn,
            title: book.title,
            author_name: book.author_name,
            price: book.price,
            stock: book.stock,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: CustomerId,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            email: customer.email,
            full_name: customer.full_name,
            created_at: customer.created_at,
        }
    }
}

// -- Handlers --

/// POST /api/v1/books: add a book to the catalog.
#[tracing::instrument(skip(state, payload))]
pub async fn add_book<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let Json(req) = payload?;
    let book = NewBook {
        isbn: parse_isbn(&req.isbn)?,
        title: req.title,
        author_name: req.author_name,
        price: req.price,
        stock: req.stock,
    };
    let book = state.catalog_service.add_book(book).await?;
    Ok((StatusCode::CREATED, Json(book.into())))
}

/// GET /api/v1/books/{isbn}: look a book up by ISBN.
#[tracing::instrument(skip(state))]
pub async fn get_book<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(isbn): Path<String>,
) -> Result<Json<BookResponse>, ApiError> {
    let isbn = parse_isbn(&isbn)?;
    let book = state.catalog_service.book_by_isbn(&isbn).await?;
    Ok(Json(book.into()))
}

/// POST /api/v1/books/{isbn}/restock: add copies to a book's stock.
#[tracing::instrument(skip(state, payload))]
pub async fn restock<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(isbn): Path<String>,
    payload: Result<Json<RestockRequest>, JsonRejection>,
) -> Result<Json<BookResponse>, ApiError> {
    let isbn = parse_isbn(&isbn)?;
    let Json(req) = payload?;
    let book = state.catalog_service.restock(&isbn, req.quantity).await?;
    Ok(Json(book.into()))
}

/// POST /api/v1/customers: register a customer.
#[tracing::instrument(skip(state, payload))]
pub async fn register_customer<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateCustomerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    let Json(req) = payload?;
    let customer = state
        .catalog_service
        .register_customer(NewCustomer {
            email: req.email,
            full_name: req.full_name,
            credential_hash: req.credential_hash,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(customer.into())))
}

fn parse_isbn(isbn: &str) -> Result<Isbn, ApiError> {
    Isbn::parse(isbn).map_err(|e| ApiError::BadRequest(e.to_string()))
}
