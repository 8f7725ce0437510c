//! Order placement engine tests against a real PostgreSQL.
//!
//! Point DATABASE_URL at a scratch database to run these; without it each
//! test prints a skip notice and passes. Every test seeds its own users and
//! listings, so the suite can run repeatedly against the same database.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use repuestos_cloud::db::listings::ListingInput;
use repuestos_cloud::db::orders::{self, OrderItemRequest, PlaceOrderRequest};
use repuestos_cloud::db::{listings, users};
use repuestos_cloud::error::OrderError;
use repuestos_cloud::util::now_millis;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping: DATABASE_URL not set");
        return None;
    };
    let pool = PgPool::connect(&url).await.expect("connect test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

async fn seed_user(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    let email = format!("{id}@test.example");
    users::create(pool, id, "Comprador Prueba", &email, "x", now_millis())
        .await
        .expect("seed user");
    id
}

async fn seed_listing(pool: &PgPool, seller: Uuid, stock: i32, precio: &str) -> Uuid {
    let id = Uuid::new_v4();
    let input = ListingInput {
        titulo: format!("Filtro de aceite {id}"),
        descripcion: String::new(),
        precio: dec(precio),
        stock,
    };
    listings::create(pool, id, seller, &input, now_millis())
        .await
        .expect("seed listing");
    id
}

async fn stock_of(pool: &PgPool, listing_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT stock FROM publicaciones WHERE id = $1")
        .bind(listing_id)
        .fetch_one(pool)
        .await
        .expect("read stock")
}

async fn order_count(pool: &PgPool, buyer_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM ordenes WHERE usuario_id = $1")
        .bind(buyer_id)
        .fetch_one(pool)
        .await
        .expect("count orders")
}

fn item(listing_id: Uuid, quantity: i32, unit_price: &str) -> OrderItemRequest {
    OrderItemRequest {
        listing_id,
        quantity,
        unit_price: dec(unit_price),
    }
}

/// Request with the total computed from its lines.
fn request(items: Vec<OrderItemRequest>) -> PlaceOrderRequest {
    let total = items
        .iter()
        .map(|i| i.unit_price * Decimal::from(i.quantity))
        .sum();
    PlaceOrderRequest {
        items,
        total,
        shipping_address: "Av. Siempre Viva 742, Springfield".into(),
    }
}

#[tokio::test]
async fn placement_decrements_stock_and_then_rejects_overdraw() {
    let Some(pool) = test_pool().await else { return };
    let seller = seed_user(&pool).await;
    let buyer = seed_user(&pool).await;
    let listing = seed_listing(&pool, seller, 5, "10.00").await;

    // Order A: 3 of 5 units
    let receipt = orders::place_order(&pool, buyer, &request(vec![item(listing, 3, "10.00")]))
        .await
        .expect("order A succeeds");
    assert_eq!(receipt.total, dec("30.00"));
    assert_eq!(stock_of(&pool, listing).await, 2);

    let (cantidad, precio_unitario, subtotal): (i32, Decimal, Decimal) = sqlx::query_as(
        "SELECT cantidad, precio_unitario, subtotal FROM detalle_orden WHERE orden_id = $1",
    )
    .bind(receipt.id)
    .fetch_one(&pool)
    .await
    .expect("line row");
    assert_eq!(cantidad, 3);
    assert_eq!(subtotal, precio_unitario * Decimal::from(cantidad));

    let estado: String = sqlx::query_scalar("SELECT estado FROM ordenes WHERE id = $1")
        .bind(receipt.id)
        .fetch_one(&pool)
        .await
        .expect("order row");
    assert_eq!(estado, "pendiente");

    // Order B: another 3 — only 2 left
    let err = orders::place_order(&pool, buyer, &request(vec![item(listing, 3, "10.00")]))
        .await
        .expect_err("order B fails");
    match err {
        OrderError::InsufficientStock {
            listing_id,
            available,
            requested,
        } => {
            assert_eq!(listing_id, listing);
            assert_eq!(available, 2);
            assert_eq!(requested, 3);
        }
        other => panic!("expected insufficient stock, got {other:?}"),
    }
    assert_eq!(stock_of(&pool, listing).await, 2);
    assert_eq!(order_count(&pool, buyer).await, 1);
}

#[tokio::test]
async fn failure_on_later_item_rolls_back_earlier_items() {
    let Some(pool) = test_pool().await else { return };
    let seller = seed_user(&pool).await;
    let buyer = seed_user(&pool).await;
    let plentiful = seed_listing(&pool, seller, 10, "4.00").await;
    let scarce = seed_listing(&pool, seller, 1, "7.50").await;

    let err = orders::place_order(
        &pool,
        buyer,
        &request(vec![item(plentiful, 2, "4.00"), item(scarce, 3, "7.50")]),
    )
    .await
    .expect_err("order fails on the scarce listing");
    assert!(matches!(err, OrderError::InsufficientStock { .. }));

    // No order, no lines, no decrement from the first item survives
    assert_eq!(order_count(&pool, buyer).await, 0);
    assert_eq!(stock_of(&pool, plentiful).await, 10);
    assert_eq!(stock_of(&pool, scarce).await, 1);
}

#[tokio::test]
async fn missing_listing_fails_the_whole_order() {
    let Some(pool) = test_pool().await else { return };
    let seller = seed_user(&pool).await;
    let buyer = seed_user(&pool).await;
    let real = seed_listing(&pool, seller, 10, "4.00").await;
    let ghost = Uuid::new_v4();

    let err = orders::place_order(
        &pool,
        buyer,
        &request(vec![item(real, 1, "4.00"), item(ghost, 1, "1.00")]),
    )
    .await
    .expect_err("order fails on the missing listing");
    match err {
        OrderError::ListingNotFound(id) => assert_eq!(id, ghost),
        other => panic!("expected listing-not-found, got {other:?}"),
    }
    assert_eq!(order_count(&pool, buyer).await, 0);
    assert_eq!(stock_of(&pool, real).await, 10);
}

#[tokio::test]
async fn concurrent_buyers_racing_for_remaining_stock() {
    let Some(pool) = test_pool().await else { return };
    let seller = seed_user(&pool).await;
    let buyer_a = seed_user(&pool).await;
    let buyer_b = seed_user(&pool).await;
    let listing = seed_listing(&pool, seller, 3, "25.00").await;

    // Both want all 3 remaining units at once
    let req_a = request(vec![item(listing, 3, "25.00")]);
    let req_b = request(vec![item(listing, 3, "25.00")]);
    let (res_a, res_b) = tokio::join!(
        orders::place_order(&pool, buyer_a, &req_a),
        orders::place_order(&pool, buyer_b, &req_b),
    );

    let succeeded = [&res_a, &res_b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1, "exactly one buyer wins the race");

    let loser = if res_a.is_err() { res_a } else { res_b };
    assert!(matches!(
        loser.expect_err("one buyer loses"),
        OrderError::InsufficientStock { available: 0, .. }
    ));
    assert_eq!(stock_of(&pool, listing).await, 0);
}

#[tokio::test]
async fn history_read_is_idempotent() {
    let Some(pool) = test_pool().await else { return };
    let seller = seed_user(&pool).await;
    let buyer = seed_user(&pool).await;
    let filtro = seed_listing(&pool, seller, 5, "10.00").await;
    let bujia = seed_listing(&pool, seller, 8, "3.25").await;

    orders::place_order(
        &pool,
        buyer,
        &request(vec![item(filtro, 2, "10.00"), item(bujia, 4, "3.25")]),
    )
    .await
    .expect("order succeeds");

    let first = orders::list_orders(&pool, buyer).await.expect("first read");
    let second = orders::list_orders(&pool, buyer).await.expect("second read");

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].items.len(), 2);
    assert_eq!(first[0].total, dec("33.00"));
    assert!(first[0].items.iter().any(|l| l.titulo.contains("Filtro")));

    // Two reads with no intervening writes are identical
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn empty_items_rejected_before_any_mutation() {
    let Some(pool) = test_pool().await else { return };
    let buyer = seed_user(&pool).await;

    let err = orders::place_order(&pool, buyer, &request(vec![]))
        .await
        .expect_err("empty order rejected");
    assert!(matches!(err, OrderError::Validation(_)));
    assert_eq!(order_count(&pool, buyer).await, 0);
}

#[tokio::test]
async fn declared_total_must_match_line_subtotals() {
    let Some(pool) = test_pool().await else { return };
    let seller = seed_user(&pool).await;
    let buyer = seed_user(&pool).await;
    let listing = seed_listing(&pool, seller, 5, "10.00").await;

    let mut req = request(vec![item(listing, 2, "10.00")]);
    req.total = dec("19.00");

    let err = orders::place_order(&pool, buyer, &req)
        .await
        .expect_err("mismatched total rejected");
    assert!(matches!(err, OrderError::Validation(_)));
    assert_eq!(stock_of(&pool, listing).await, 5);
}
