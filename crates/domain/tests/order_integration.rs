//! Integration tests for the order workflow.
//!
//! These tests drive the services against the in-memory store and check the
//! workflow's guarantees: pricing, stock accounting, atomicity and
//! serialization of concurrent orders.

use common::{Isbn, Money};
use domain::{
    CatalogService, CreateOrder, DomainError, NewBook, NewCustomer, OrderError, OrderLine,
    OrderPolicy, OrderService, TransitionPolicy,
};
use store::{InMemoryStore, OrderLedger, OrderStatus};

const EMAIL: &str = "reader@example.com";
const HALLOWS: &str = "978-0545010221";
const KNUTH: &str = "9780306406157";
const EFFECTIVE_JAVA: &str = "9780134685991";

fn isbn(s: &str) -> Isbn {
    Isbn::parse(s).unwrap()
}

/// Helper to create services over a fresh store with a registered customer
async fn setup(policy: OrderPolicy) -> (OrderService<InMemoryStore>, CatalogService<InMemoryStore>) {
    let store = InMemoryStore::new();
    let catalog = CatalogService::new(store.clone());
    catalog
        .register_customer(NewCustomer {
            email: EMAIL.to_string(),
            full_name: "Avid Reader".to_string(),
            credential_hash: "hash".to_string(),
        })
        .await
        .unwrap();
    (OrderService::with_policy(store, policy), catalog)
}

async fn add_book(
    catalog: &CatalogService<InMemoryStore>,
    code: &str,
    title: &str,
    price: &str,
    stock: u32,
) {
    catalog
        .add_book(NewBook {
            isbn: isbn(code),
            title: title.to_string(),
            author_name: "Some Author".to_string(),
            price: price.parse::<Money>().unwrap(),
            stock,
        })
        .await
        .unwrap();
}

async fn stock(catalog: &CatalogService<InMemoryStore>, code: &str) -> u32 {
    catalog.book_by_isbn(&isbn(code)).await.unwrap().stock
}

fn order_for(lines: &[(&str, u32)]) -> CreateOrder {
    CreateOrder::new(
        EMAIL,
        lines
            .iter()
            .map(|(code, quantity)| OrderLine::new(isbn(code), *quantity))
            .collect(),
    )
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn single_line_order_prices_and_deducts() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 100).await;

        let view = orders.create_order(order_for(&[(HALLOWS, 2)])).await.unwrap();

        assert_eq!(view.total_amount, Money::from_cents(5998));
        assert_eq!(view.total_amount.to_string(), "59.98");
        assert_eq!(view.status, OrderStatus::Pending);
        assert_eq!(view.customer_email, EMAIL);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].unit_price, Money::from_cents(2999));
        assert_eq!(view.items[0].line_total, Money::from_cents(5998));
        assert_eq!(view.items[0].book_isbn, isbn(HALLOWS));
        assert_eq!(stock(&catalog, HALLOWS).await, 98);
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_stock_alone() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 1).await;

        let err = orders
            .create_order(order_for(&[(HALLOWS, 2)]))
            .await
            .unwrap_err();

        assert_eq!(
            err.as_order_error(),
            Some(&OrderError::InsufficientStock {
                isbn: isbn(HALLOWS),
                title: "Deathly Hallows".to_string(),
                available: 1,
                requested: 2,
            })
        );
        assert_eq!(stock(&catalog, HALLOWS).await, 1);
        assert!(orders.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_customer_is_rejected() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;

        let cmd = CreateOrder::new("nobody@example.com", vec![OrderLine::new(isbn(HALLOWS), 1)]);
        let err = orders.create_order(cmd).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::CustomerNotFound(_))
        ));
        assert_eq!(stock(&catalog, HALLOWS).await, 10);
    }

    #[tokio::test]
    async fn empty_order_is_rejected() {
        let (orders, _) = setup(OrderPolicy::default()).await;

        let err = orders
            .create_order(CreateOrder::new(EMAIL, vec![]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn permissive_policy_allows_any_move() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;
        let order = orders.create_order(order_for(&[(HALLOWS, 1)])).await.unwrap();

        let shipped = orders
            .update_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);

        let cancelled = orders
            .update_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let reopened = orders
            .update_status(order.id, OrderStatus::Pending)
            .await
            .unwrap();
        assert_eq!(reopened.status, OrderStatus::Pending);

        // No restocking by default.
        assert_eq!(stock(&catalog, HALLOWS).await, 9);
    }
}

mod invariants {
    use super::*;

    #[tokio::test]
    async fn first_failing_line_in_request_order_is_reported() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 1).await;

        // KNUTH sorts before HALLOWS and is not in the catalog.
        let err = orders
            .create_order(order_for(&[(HALLOWS, 2), (KNUTH, 1)]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::InsufficientStock { available: 1, requested: 2, .. })
        ));
        assert_eq!(stock(&catalog, HALLOWS).await, 1);
    }

    #[tokio::test]
    async fn total_matches_line_items() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;
        add_book(&catalog, KNUTH, "Concrete Mathematics", "45.50", 10).await;
        add_book(&catalog, EFFECTIVE_JAVA, "Effective Java", "0.01", 10).await;

        let view = orders
            .create_order(order_for(&[(HALLOWS, 3), (KNUTH, 1), (EFFECTIVE_JAVA, 7)]))
            .await
            .unwrap();

        let sum = view
            .items
            .iter()
            .map(|item| item.unit_price.checked_mul(item.quantity).unwrap())
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
            .unwrap();
        assert_eq!(view.total_amount, sum);
        assert_eq!(view.total_amount.to_string(), "135.54");
        assert_eq!(view.item_count(), 11);

        let stored = orders.store().find_order(view.id).await.unwrap().unwrap();
        assert!(stored.total_matches_items());
    }

    #[tokio::test]
    async fn stock_is_conserved() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 20).await;
        add_book(&catalog, KNUTH, "Concrete Mathematics", "45.50", 20).await;

        orders
            .create_order(order_for(&[(HALLOWS, 3), (KNUTH, 2)]))
            .await
            .unwrap();
        orders.create_order(order_for(&[(HALLOWS, 4)])).await.unwrap();

        let sold: u32 = orders
            .list_orders()
            .await
            .unwrap()
            .iter()
            .flat_map(|order| order.items.iter())
            .filter(|item| item.book_isbn == isbn(HALLOWS))
            .map(|item| item.quantity)
            .sum();

        assert_eq!(sold, 7);
        assert_eq!(stock(&catalog, HALLOWS).await + sold, 20);
        assert_eq!(stock(&catalog, KNUTH).await, 18);
    }

    #[tokio::test]
    async fn failing_line_rolls_back_earlier_lines() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;
        add_book(&catalog, KNUTH, "Concrete Mathematics", "45.50", 1).await;

        let err = orders
            .create_order(order_for(&[(HALLOWS, 5), (KNUTH, 2)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InsufficientStock { .. })
        ));

        assert_eq!(stock(&catalog, HALLOWS).await, 10);
        assert_eq!(stock(&catalog, KNUTH).await, 1);
        assert_eq!(orders.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_book_rolls_back_earlier_lines() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;

        let err = orders
            .create_order(order_for(&[(HALLOWS, 5), (EFFECTIVE_JAVA, 1)]))
            .await
            .unwrap_err();

        assert_eq!(
            err.as_order_error(),
            Some(&OrderError::BookNotFound("9780134685991".to_string()))
        );
        assert_eq!(stock(&catalog, HALLOWS).await, 10);
        assert_eq!(orders.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn first_failing_line_is_reported() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 0).await;
        add_book(&catalog, KNUTH, "Concrete Mathematics", "45.50", 0).await;

        let err = orders
            .create_order(order_for(&[(KNUTH, 1), (HALLOWS, 1)]))
            .await
            .unwrap_err();

        match err {
            DomainError::Order(OrderError::InsufficientStock { title, .. }) => {
                assert_eq!(title, "Concrete Mathematics")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn repeated_book_sees_earlier_deduction() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 3).await;

        let view = orders
            .create_order(order_for(&[(HALLOWS, 2), (HALLOWS, 1)]))
            .await
            .unwrap();
        assert_eq!(view.items.len(), 2);
        assert_eq!(stock(&catalog, HALLOWS).await, 0);

        add_book(&catalog, KNUTH, "Concrete Mathematics", "45.50", 3).await;
        let err = orders
            .create_order(order_for(&[(KNUTH, 2), (KNUTH, 2)]))
            .await
            .unwrap_err();
        assert_eq!(
            err.as_order_error(),
            Some(&OrderError::InsufficientStock {
                isbn: isbn(KNUTH),
                title: "Concrete Mathematics".to_string(),
                available: 1,
                requested: 2,
            })
        );
        assert_eq!(stock(&catalog, KNUTH).await, 3);
    }

    #[tokio::test]
    async fn price_is_snapshotted_at_creation() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;
        let view = orders.create_order(order_for(&[(HALLOWS, 1)])).await.unwrap();

        let mut book = catalog.book_by_isbn(&isbn(HALLOWS)).await.unwrap();
        book.price = Money::from_cents(9999);
        store::CatalogStore::save_book(orders.store(), &book).await.unwrap();

        let reread = orders.find_order(view.id).await.unwrap();
        assert_eq!(reread.items[0].unit_price, Money::from_cents(2999));
        assert_eq!(reread.total_amount, Money::from_cents(2999));
    }

    #[tokio::test]
    async fn reads_are_idempotent() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;
        let created = orders.create_order(order_for(&[(HALLOWS, 2)])).await.unwrap();

        let first = orders.find_order(created.id).await.unwrap();
        let second = orders.find_order(created.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, created);
        assert_eq!(stock(&catalog, HALLOWS).await, 8);
    }

    #[tokio::test]
    async fn list_is_in_creation_order() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;

        let mut created = Vec::new();
        for _ in 0..3 {
            created.push(orders.create_order(order_for(&[(HALLOWS, 1)])).await.unwrap().id);
        }

        let listed: Vec<_> = orders
            .list_orders()
            .await
            .unwrap()
            .into_iter()
            .map(|view| view.id)
            .collect();
        assert_eq!(listed, created);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_copy_is_sold_once() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 1).await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let orders = orders.clone();
                tokio::spawn(async move { orders.create_order(order_for(&[(HALLOWS, 1)])).await })
            })
            .collect();

        let mut successes = 0;
        let mut shortages = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(DomainError::Order(OrderError::InsufficientStock { available, .. })) => {
                    assert_eq!(available, 0);
                    shortages += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(shortages, 1);
        assert_eq!(stock(&catalog, HALLOWS).await, 0);
        assert_eq!(orders.store().order_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_buyers_never_oversell() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let orders = orders.clone();
                tokio::spawn(async move { orders.create_order(order_for(&[(HALLOWS, 1)])).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 10);
        assert_eq!(stock(&catalog, HALLOWS).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn crossed_line_orders_all_succeed() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 20).await;
        add_book(&catalog, KNUTH, "Concrete Mathematics", "45.50", 20).await;

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let orders = orders.clone();
                let lines = if i % 2 == 0 {
                    [(HALLOWS, 1), (KNUTH, 1)]
                } else {
                    [(KNUTH, 1), (HALLOWS, 1)]
                };
                tokio::spawn(async move { orders.create_order(order_for(&lines)).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(stock(&catalog, HALLOWS).await, 0);
        assert_eq!(stock(&catalog, KNUTH).await, 0);
    }
}

mod policies {
    use super::*;

    #[tokio::test]
    async fn strict_policy_rejects_backwards_move() {
        let policy = OrderPolicy::new().with_transitions(TransitionPolicy::Strict);
        let (orders, catalog) = setup(policy).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;
        let order = orders.create_order(order_for(&[(HALLOWS, 1)])).await.unwrap();

        orders
            .update_status(order.id, OrderStatus::Processing)
            .await
            .unwrap();
        orders
            .update_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();

        let err = orders
            .update_status(order.id, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(
            err.as_order_error(),
            Some(&OrderError::InvalidStatusTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Pending,
            })
        );
        assert_eq!(
            orders.find_order(order.id).await.unwrap().status,
            OrderStatus::Shipped
        );
    }

    #[tokio::test]
    async fn restock_policy_returns_stock_on_cancel() {
        let policy = OrderPolicy::new().with_restock_on_cancel(true);
        let (orders, catalog) = setup(policy).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;
        add_book(&catalog, KNUTH, "Concrete Mathematics", "45.50", 10).await;

        let order = orders
            .create_order(order_for(&[(HALLOWS, 4), (KNUTH, 1)]))
            .await
            .unwrap();
        assert_eq!(stock(&catalog, HALLOWS).await, 6);

        orders
            .update_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(stock(&catalog, HALLOWS).await, 10);
        assert_eq!(stock(&catalog, KNUTH).await, 10);

        // Cancelling again does not return the stock twice.
        orders
            .update_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(stock(&catalog, HALLOWS).await, 10);

        // Deleting a cancelled order leaves stock alone.
        orders.delete_order(order.id).await.unwrap();
        assert_eq!(stock(&catalog, HALLOWS).await, 10);
    }

    #[tokio::test]
    async fn rejected_transition_does_not_restock() {
        let policy = OrderPolicy::new()
            .with_transitions(TransitionPolicy::Strict)
            .with_restock_on_cancel(true);
        let (orders, catalog) = setup(policy).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;
        let order = orders.create_order(order_for(&[(HALLOWS, 2)])).await.unwrap();

        orders
            .update_status(order.id, OrderStatus::Processing)
            .await
            .unwrap();
        orders
            .update_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();

        assert!(
            orders
                .update_status(order.id, OrderStatus::Cancelled)
                .await
                .is_err()
        );
        assert_eq!(stock(&catalog, HALLOWS).await, 8);
    }

    #[tokio::test]
    async fn reopening_a_cancelled_order_never_restocks_twice() {
        let (orders, catalog) = setup(OrderPolicy::new().with_restock_on_cancel(true)).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;
        add_book(&catalog, KNUTH, "Concrete Mathematics", "45.50", 10).await;
        let order = orders
            .create_order(order_for(&[(HALLOWS, 4), (KNUTH, 1)]))
            .await
            .unwrap();

        for status in [
            OrderStatus::Cancelled,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
            OrderStatus::Processing,
        ] {
            orders.update_status(order.id, status).await.unwrap();
        }
        assert_eq!(stock(&catalog, HALLOWS).await, 10);
        assert_eq!(stock(&catalog, KNUTH).await, 10);

        let stored = orders.store().find_order(order.id).await.unwrap().unwrap();
        assert!(stored.stock_returned);

        orders.delete_order(order.id).await.unwrap();
        assert_eq!(stock(&catalog, HALLOWS).await, 10);
        assert_eq!(stock(&catalog, KNUTH).await, 10);
    }
}

mod views {
    use super::*;

    #[tokio::test]
    async fn view_serializes_money_as_decimal_strings() {
        let (orders, catalog) = setup(OrderPolicy::default()).await;
        add_book(&catalog, HALLOWS, "Deathly Hallows", "29.99", 10).await;
        let view = orders.create_order(order_for(&[(HALLOWS, 2)])).await.unwrap();

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["total_amount"], "59.98");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["customer_full_name"], "Avid Reader");
        assert_eq!(json["items"][0]["unit_price"], "29.99");
        assert_eq!(json["items"][0]["book_isbn"], "9780545010221");
        assert_eq!(json["items"][0]["book_author_name"], "Some Author");
    }
}
