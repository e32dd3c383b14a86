use std::collections::HashMap;

use async_trait::async_trait;
use common::{BookId, CustomerId, Isbn, Money, OrderId, OrderItemId};
use sqlx::{
    PgConnection, PgPool, Postgres, Row, Transaction,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::{
    Book, Customer, Order, OrderItem, OrderStatus, Result, StoreError, normalize_email,
    store::{CatalogStore, CustomerDirectory, OrderLedger, Store, UnitOfWork},
};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `url`.
    #[tracing::instrument(skip(url))]
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    #[tracing::instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn find_book(&self, id: BookId) -> Result<Option<Book>> {
        let mut conn = self.pool.acquire().await?;
        fetch_book(&mut conn, id, false).await
    }

    async fn find_book_by_isbn(&self, isbn: &Isbn) -> Result<Option<Book>> {
        let mut conn = self.pool.acquire().await?;
        fetch_book_by_isbn(&mut conn, isbn, false).await
    }

    async fn save_book(&self, book: &Book) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_book(&mut conn, book).await
    }
}

#[async_trait]
impl CustomerDirectory for PostgresStore {
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, full_name, credential_hash, created_at, updated_at
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_customer).transpose()
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        fetch_customer_by_email(&mut conn, email).await
    }

    async fn save_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, email, full_name, credential_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                full_name = EXCLUDED.full_name,
                credential_hash = EXCLUDED.credential_hash,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(normalize_email(&customer.email))
        .bind(&customer.full_name)
        .bind(&customer.credential_hash)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }
}

#[async_trait]
impl OrderLedger for PostgresStore {
    async fn save_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_order(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id, false).await
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let order_rows = sqlx::query(
            r#"
            SELECT id, customer_id, total_cents, status, stock_returned, created_at, updated_at
            FROM orders
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, book_id, quantity, unit_price_cents, line_total_cents
            FROM order_items
            ORDER BY order_id ASC, position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            items_by_order
                .entry(order_id)
                .or_default()
                .push(row_to_item(row)?);
        }

        order_rows
            .iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                let items = items_by_order.remove(&id).unwrap_or_default();
                row_to_order(row, items)
            })
            .collect()
    }

    async fn order_exists(&self, id: OrderId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        remove_order(&mut conn, id).await
    }
}

#[async_trait]
impl Store for PostgresStore {
    type UnitOfWork = PostgresUnitOfWork;

    async fn begin(&self) -> Result<PostgresUnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUnitOfWork { tx })
    }
}

/// Unit of work backed by a database transaction.
///
/// Book and order lookups use `SELECT ... FOR UPDATE`, so concurrent units
/// of work touching the same rows wait for each other. Batch book locks are
/// taken with `ORDER BY isbn`, which fixes the order rows are locked in.
/// Dropping it without committing rolls the transaction back.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn find_customer_by_email(&mut self, email: &str) -> Result<Option<Customer>> {
        fetch_customer_by_email(&mut self.tx, email).await
    }

    async fn find_book_by_isbn(&mut self, isbn: &Isbn) -> Result<Option<Book>> {
        fetch_book_by_isbn(&mut self.tx, isbn, true).await
    }

    async fn find_book(&mut self, id: BookId) -> Result<Option<Book>> {
        fetch_book(&mut self.tx, id, true).await
    }

    async fn lock_books_by_isbn(&mut self, isbns: &[Isbn]) -> Result<Vec<Book>> {
        let keys: Vec<String> = isbns.iter().map(|isbn| isbn.as_str().to_string()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, isbn, title, author_name, price_cents, stock, created_at, updated_at
            FROM books
            WHERE isbn = ANY($1)
            ORDER BY isbn
            FOR UPDATE
            "#,
        )
        .bind(keys)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_book).collect()
    }

    async fn lock_books(&mut self, ids: &[BookId]) -> Result<Vec<Book>> {
        let keys: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, isbn, title, author_name, price_cents, stock, created_at, updated_at
            FROM books
            WHERE id = ANY($1)
            ORDER BY isbn
            FOR UPDATE
            "#,
        )
        .bind(keys)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_book).collect()
    }

    async fn save_book(&mut self, book: &Book) -> Result<()> {
        upsert_book(&mut self.tx, book).await
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        fetch_order(&mut self.tx, id, true).await
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        upsert_order(&mut self.tx, order).await
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool> {
        remove_order(&mut self.tx, id).await
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

// Queries shared by the pool and the transaction paths.

async fn fetch_book(conn: &mut PgConnection, id: BookId, lock: bool) -> Result<Option<Book>> {
    let sql = if lock {
        r#"
        SELECT id, isbn, title, author_name, price_cents, stock, created_at, updated_at
        FROM books
        WHERE id = $1
        FOR UPDATE
        "#
    } else {
        r#"
        SELECT id, isbn, title, author_name, price_cents, stock, created_at, updated_at
        FROM books
        WHERE id = $1
        "#
    };

    let row = sqlx::query(sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_book).transpose()
}

async fn fetch_book_by_isbn(
    conn: &mut PgConnection,
    isbn: &Isbn,
    lock: bool,
) -> Result<Option<Book>> {
    let sql = if lock {
        r#"
        SELECT id, isbn, title, author_name, price_cents, stock, created_at, updated_at
        FROM books
        WHERE isbn = $1
        FOR UPDATE
        "#
    } else {
        r#"
        SELECT id, isbn, title, author_name, price_cents, stock, created_at, updated_at
        FROM books
        WHERE isbn = $1
        "#
    };

    let row = sqlx::query(sql)
        .bind(isbn.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_book).transpose()
}

async fn upsert_book(conn: &mut PgConnection, book: &Book) -> Result<()> {
    let stock = i32::try_from(book.stock)
        .map_err(|_| StoreError::Corrupt(format!("stock {} out of range", book.stock)))?;

    sqlx::query(
        r#"
        INSERT INTO books (id, isbn, title, author_name, price_cents, stock, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE SET
            isbn = EXCLUDED.isbn,
            title = EXCLUDED.title,
            author_name = EXCLUDED.author_name,
            price_cents = EXCLUDED.price_cents,
            stock = EXCLUDED.stock,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(book.id.as_uuid())
    .bind(book.isbn.as_str())
    .bind(&book.title)
    .bind(&book.author_name)
    .bind(book.price.cents())
    .bind(stock)
    .bind(book.created_at)
    .bind(book.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(map_write_error)?;

    Ok(())
}

async fn fetch_customer_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<Option<Customer>> {
    let row = sqlx::query(
        r#"
        SELECT id, email, full_name, credential_hash, created_at, updated_at
        FROM customers
        WHERE email = $1
        "#,
    )
    .bind(normalize_email(email))
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_customer).transpose()
}

async fn fetch_order(conn: &mut PgConnection, id: OrderId, lock: bool) -> Result<Option<Order>> {
    let sql = if lock {
        r#"
        SELECT id, customer_id, total_cents, status, stock_returned, created_at, updated_at
        FROM orders
        WHERE id = $1
        FOR UPDATE
        "#
    } else {
        r#"
        SELECT id, customer_id, total_cents, status, stock_returned, created_at, updated_at
        FROM orders
        WHERE id = $1
        "#
    };

    let row = sqlx::query(sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let item_rows = sqlx::query(
        r#"
        SELECT id, order_id, book_id, quantity, unit_price_cents, line_total_cents
        FROM order_items
        WHERE order_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    let items = item_rows
        .iter()
        .map(row_to_item)
        .collect::<Result<Vec<_>>>()?;

    row_to_order(&row, items).map(Some)
}

async fn upsert_order(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (id, customer_id, total_cents, status, stock_returned, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            stock_returned = EXCLUDED.stock_returned,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(order.id.as_uuid())
    .bind(order.customer_id.as_uuid())
    .bind(order.total_amount.cents())
    .bind(order.status.as_str())
    .bind(order.stock_returned)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(map_write_error)?;

    for (position, item) in order.items.iter().enumerate() {
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| StoreError::Corrupt(format!("quantity {} out of range", item.quantity)))?;

        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, book_id, position, quantity, unit_price_cents, line_total_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(order.id.as_uuid())
        .bind(item.book_id.as_uuid())
        .bind(position as i32)
        .bind(quantity)
        .bind(item.unit_price.cents())
        .bind(item.line_total.cents())
        .execute(&mut *conn)
        .await
        .map_err(map_write_error)?;
    }

    Ok(())
}

async fn remove_order(conn: &mut PgConnection, id: OrderId) -> Result<bool> {
    // order_items rows go with it through ON DELETE CASCADE
    let result = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id.as_uuid())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let message = match db_err.constraint() {
            Some("unique_book_isbn") => "ISBN is already registered".to_string(),
            Some("unique_customer_email") => "email is already registered".to_string(),
            other => format!("duplicate key ({})", other.unwrap_or("unknown")),
        };
        return StoreError::Conflict(message);
    }
    StoreError::Database(e)
}

fn row_to_book(row: &PgRow) -> Result<Book> {
    let isbn: String = row.try_get("isbn")?;
    let stock: i32 = row.try_get("stock")?;

    Ok(Book {
        id: BookId::from_uuid(row.try_get::<Uuid, _>("id")?),
        isbn: Isbn::parse(&isbn).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        title: row.try_get("title")?,
        author_name: row.try_get("author_name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: u32::try_from(stock)
            .map_err(|_| StoreError::Corrupt(format!("negative stock {stock} for {isbn}")))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_customer(row: &PgRow) -> Result<Customer> {
    Ok(Customer {
        id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        credential_hash: row.try_get("credential_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    let quantity: i32 = row.try_get("quantity")?;

    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        book_id: BookId::from_uuid(row.try_get::<Uuid, _>("book_id")?),
        quantity: u32::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("negative quantity {quantity}")))?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        line_total: Money::from_cents(row.try_get("line_total_cents")?),
    })
}

fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let status: String = row.try_get("status")?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        items,
        total_amount: Money::from_cents(row.try_get("total_cents")?),
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        stock_returned: row.try_get("stock_returned")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
