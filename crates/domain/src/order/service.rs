//! Order service: the workflow that places orders and moves them along.

use std::collections::HashMap;
use std::time::Instant;

use common::{BookId, Isbn, OrderId};
use store::{Book, Order, OrderItem, OrderStatus, Store, StoreError, UnitOfWork};

use crate::error::DomainError;

use super::{CreateOrder, OrderError, OrderPolicy, OrderView};

/// Service for managing orders.
///
/// Every write runs inside one unit of work of the underlying store, so a
/// failing operation leaves neither stock changes nor order rows behind.
/// Views are materialized only after the unit of work has ended.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
    policy: OrderPolicy,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service with the default policy.
    pub fn new(store: S) -> Self {
        Self::with_policy(store, OrderPolicy::default())
    }

    /// Creates a new order service with the given policy.
    pub fn with_policy(store: S, policy: OrderPolicy) -> Self {
        Self { store, policy }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order: checks and deducts stock for every line, then stores
    /// the order as `PENDING`.
    ///
    /// Every requested book is locked up front in ISBN order. Lines are then
    /// processed in request order and the first failing line is the one
    /// reported. The same book may appear on several lines; later lines see
    /// the stock already taken by earlier ones.
    #[tracing::instrument(skip(self, cmd), fields(lines = cmd.items.len()))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<OrderView, DomainError> {
        let started = Instant::now();
        let result = self.place_order(cmd).await;
        metrics::histogram!("order_create_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let order = match result {
            Ok(order) => order,
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.reason()).increment(1);
                tracing::warn!(reason = e.reason(), error = %e, "order rejected");
                return Err(e);
            }
        };

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            total = %order.total_amount,
            items = order.items.len(),
            "order created"
        );

        OrderView::load(&self.store, order).await
    }

    async fn place_order(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        let mut uow = self.store.begin().await?;

        let customer = uow
            .find_customer_by_email(&cmd.customer_email)
            .await?
            .ok_or_else(|| OrderError::CustomerNotFound(cmd.customer_email.clone()))?;

        if cmd.items.is_empty() {
            return Err(
                OrderError::InvalidRequest("order must contain at least one item".into()).into(),
            );
        }
        if let Some(line) = cmd.items.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidRequest(format!(
                "quantity for ISBN {} must be at least 1",
                line.isbn
            ))
            .into());
        }

        let mut isbns: Vec<Isbn> = cmd.items.iter().map(|line| line.isbn.clone()).collect();
        isbns.sort();
        isbns.dedup();
        let mut books: HashMap<Isbn, Book> = uow
            .lock_books_by_isbn(&isbns)
            .await?
            .into_iter()
            .map(|book| (book.isbn.clone(), book))
            .collect();

        let mut items = Vec::with_capacity(cmd.items.len());
        for line in &cmd.items {
            let book = books
                .get_mut(&line.isbn)
                .ok_or_else(|| OrderError::BookNotFound(line.isbn.to_string()))?;

            let available = book.stock;
            if !book.withdraw(line.quantity) {
                return Err(OrderError::InsufficientStock {
                    isbn: book.isbn.clone(),
                    title: book.title.clone(),
                    available,
                    requested: line.quantity,
                }
                .into());
            }

            let item = OrderItem::new(book.id, line.quantity, book.price).ok_or_else(|| {
                OrderError::InvalidRequest(format!(
                    "line total for ISBN {} is too large",
                    line.isbn
                ))
            })?;
            items.push(item);
        }

        for book in books.values() {
            uow.save_book(book).await?;
        }

        let order = Order::new(customer.id, items)
            .ok_or_else(|| OrderError::InvalidRequest("order total is too large".into()))?;
        uow.save_order(&order).await?;
        uow.commit().await?;

        Ok(order)
    }

    /// Sets the status of an order, subject to the transition policy.
    ///
    /// With restocking enabled, moving into `CANCELLED` returns every line's
    /// quantity to its book in the same unit of work, unless this order has
    /// already returned its stock once.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderView, DomainError> {
        let mut uow = self.store.begin().await?;
        let mut order = uow
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;

        let from = order.status;
        self.policy.transitions.check(from, status)?;

        if status == OrderStatus::Cancelled && self.returns_stock(&order) {
            return_stock(&mut uow, &mut order).await?;
        }

        order.set_status(status);
        uow.save_order(&order).await?;
        uow.commit().await?;

        metrics::counter!("order_status_updates_total", "status" => status.as_str()).increment(1);
        tracing::info!(%order_id, %from, to = %status, "order status updated");

        OrderView::load(&self.store, order).await
    }

    /// Loads an order by ID.
    #[tracing::instrument(skip(self))]
    pub async fn find_order(&self, order_id: OrderId) -> Result<OrderView, DomainError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        OrderView::load(&self.store, order).await
    }

    /// Lists every order, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderView>, DomainError> {
        let orders = self.store.list_orders().await?;
        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            views.push(OrderView::load(&self.store, order).await?);
        }
        Ok(views)
    }

    /// Deletes an order and its items.
    ///
    /// With restocking enabled, an order that is not cancelled and has not
    /// returned its stock yet returns it first.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), DomainError> {
        let mut uow = self.store.begin().await?;
        let mut order = uow
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;

        if self.returns_stock(&order) {
            return_stock(&mut uow, &mut order).await?;
        }

        uow.delete_order(order_id).await?;
        uow.commit().await?;

        tracing::info!(%order_id, "order deleted");
        Ok(())
    }

    fn returns_stock(&self, order: &Order) -> bool {
        self.policy.restock_on_cancel
            && !order.stock_returned
            && order.status != OrderStatus::Cancelled
    }
}

/// Adds each line's quantity back to its book and marks the order.
async fn return_stock<U: UnitOfWork>(uow: &mut U, order: &mut Order) -> Result<(), DomainError> {
    let ids: Vec<BookId> = order.items.iter().map(|item| item.book_id).collect();
    let mut books: HashMap<BookId, Book> = uow
        .lock_books(&ids)
        .await?
        .into_iter()
        .map(|book| (book.id, book))
        .collect();

    for item in &order.items {
        let book = books.get_mut(&item.book_id).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "order {} references missing book {}",
                order.id, item.book_id
            ))
        })?;
        if !book.restock(item.quantity) {
            return Err(OrderError::InvalidRequest(format!(
                "returning {} copies would overflow the stock of ISBN {}",
                item.quantity, book.isbn
            ))
            .into());
        }
    }
    for book in books.values() {
        uow.save_book(book).await?;
    }

    order.stock_returned = true;
    tracing::debug!(order_id = %order.id, lines = order.items.len(), "stock returned");
    Ok(())
}
