//! Order database operations: the placement engine and the history read.
//!
//! `place_order` is the one mutation path for stock. It runs as a single
//! transaction: header insert, then per listing an exclusive row lock
//! (`SELECT ... FOR UPDATE`), stock check, line insert, stock decrement.
//! Dropping the transaction on any early return rolls everything back, so
//! either the order exists with all its lines and decrements or nothing
//! survives the call.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::OrderError;
use crate::util::now_millis;

/// Upper bound on waiting for a listing's row lock. A holder that commits
/// or aborts releases the lock well before this; hitting the bound surfaces
/// as a retryable `TransactionAbort` instead of blocking the request task
/// indefinitely.
const LOCK_TIMEOUT: &str = "5s";

/// One requested line: listing, quantity, and the unit price quoted to the
/// buyer at checkout time.
#[derive(Debug, Clone)]
pub struct OrderItemRequest {
    pub listing_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A buyer's placement request, already stripped of wire-format concerns.
#[derive(Debug)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub total: Decimal,
    pub shipping_address: String,
}

/// Durable outcome of a successful placement.
#[derive(Debug, serde::Serialize)]
pub struct OrderReceipt {
    pub id: Uuid,
    pub fecha: i64,
    pub total: Decimal,
}

fn line_subtotal(item: &OrderItemRequest) -> Decimal {
    item.unit_price * Decimal::from(item.quantity)
}

/// Precondition checks. Runs before any storage call; a violation means
/// nothing was touched.
fn validate(req: &PlaceOrderRequest) -> Result<(), OrderError> {
    if req.items.is_empty() {
        return Err(OrderError::Validation("items must not be empty".into()));
    }
    for item in &req.items {
        if item.quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "quantity for listing {} must be positive",
                item.listing_id
            )));
        }
        if item.unit_price.is_sign_negative() {
            return Err(OrderError::Validation(format!(
                "unit price for listing {} must not be negative",
                item.listing_id
            )));
        }
    }
    if req.shipping_address.trim().is_empty() {
        return Err(OrderError::Validation(
            "shipping address must not be empty".into(),
        ));
    }

    let computed: Decimal = req.items.iter().map(line_subtotal).sum();
    if computed != req.total {
        return Err(OrderError::Validation(format!(
            "declared total {} does not match line subtotals {}",
            req.total, computed
        )));
    }

    Ok(())
}

/// Items in ascending listing-id order. Locks are always acquired in this
/// canonical order so two multi-item orders touching the same listings
/// cannot deadlock each other.
fn sorted_by_listing(items: &[OrderItemRequest]) -> Vec<&OrderItemRequest> {
    let mut sorted: Vec<&OrderItemRequest> = items.iter().collect();
    sorted.sort_by_key(|item| item.listing_id);
    sorted
}

/// Atomically place an order for `buyer_id`.
///
/// On success one `ordenes` row, one `detalle_orden` row per item, and the
/// matching stock decrements are committed together. On any failure the
/// transaction rolls back and the specific error propagates.
pub async fn place_order(
    pool: &PgPool,
    buyer_id: Uuid,
    req: &PlaceOrderRequest,
) -> Result<OrderReceipt, OrderError> {
    validate(req)?;

    let mut tx = pool.begin().await?;

    // Scoped to this transaction; see LOCK_TIMEOUT.
    sqlx::query(&format!("SET LOCAL lock_timeout = '{LOCK_TIMEOUT}'"))
        .execute(&mut *tx)
        .await?;

    let order_id = Uuid::new_v4();
    let fecha = now_millis();

    sqlx::query(
        "INSERT INTO ordenes (id, usuario_id, total, estado, direccion_envio, fecha)
         VALUES ($1, $2, $3, 'pendiente', $4, $5)",
    )
    .bind(order_id)
    .bind(buyer_id)
    .bind(req.total)
    .bind(req.shipping_address.trim())
    .bind(fecha)
    .execute(&mut *tx)
    .await?;

    for item in sorted_by_listing(&req.items) {
        // Exclusive row lock: concurrent placements on this listing queue
        // here until we commit or roll back.
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT stock FROM publicaciones WHERE id = $1 FOR UPDATE")
                .bind(item.listing_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((stock,)) = row else {
            return Err(OrderError::ListingNotFound(item.listing_id));
        };

        if stock < item.quantity {
            return Err(OrderError::InsufficientStock {
                listing_id: item.listing_id,
                available: stock,
                requested: item.quantity,
            });
        }

        sqlx::query(
            "INSERT INTO detalle_orden (orden_id, publicacion_id, cantidad, precio_unitario, subtotal)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(order_id)
        .bind(item.listing_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(line_subtotal(item))
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE publicaciones SET stock = stock - $1 WHERE id = $2")
            .bind(item.quantity)
            .bind(item.listing_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(OrderReceipt {
        id: order_id,
        fecha,
        total: req.total,
    })
}

// ── Order history ──

#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct OrderLineView {
    pub cantidad: i32,
    pub precio_unitario: Decimal,
    pub titulo: String,
}

#[derive(Debug, serde::Serialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub fecha: i64,
    pub total: Decimal,
    pub items: Vec<OrderLineView>,
}

/// All orders placed by `buyer_id`, newest first, each with its lines
/// joined to the listing title. Pure read over committed state.
pub async fn list_orders(pool: &PgPool, buyer_id: Uuid) -> Result<Vec<OrderSummary>, sqlx::Error> {
    let headers: Vec<(Uuid, Decimal, i64)> = sqlx::query_as(
        "SELECT id, total, fecha FROM ordenes WHERE usuario_id = $1 ORDER BY fecha DESC, id",
    )
    .bind(buyer_id)
    .fetch_all(pool)
    .await?;

    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<Uuid> = headers.iter().map(|(id, _, _)| *id).collect();

    let lines: Vec<(Uuid, OrderLineView)> = sqlx::query_as(
        r#"
        SELECT d.orden_id, d.cantidad, d.precio_unitario, p.titulo
        FROM detalle_orden d
        JOIN publicaciones p ON p.id = d.publicacion_id
        WHERE d.orden_id = ANY($1)
        ORDER BY d.id
        "#,
    )
    .bind(&order_ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(orden_id, cantidad, precio_unitario, titulo): (Uuid, i32, Decimal, String)| {
        (
            orden_id,
            OrderLineView {
                cantidad,
                precio_unitario,
                titulo,
            },
        )
    })
    .collect();

    let mut by_order: HashMap<Uuid, Vec<OrderLineView>> = HashMap::new();
    for (orden_id, line) in lines {
        by_order.entry(orden_id).or_default().push(line);
    }

    Ok(headers
        .into_iter()
        .map(|(id, total, fecha)| OrderSummary {
            id,
            fecha,
            total,
            items: by_order.remove(&id).unwrap_or_default(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(listing_id: Uuid, quantity: i32, unit_price: &str) -> OrderItemRequest {
        OrderItemRequest {
            listing_id,
            quantity,
            unit_price: dec(unit_price),
        }
    }

    fn request(items: Vec<OrderItemRequest>, total: &str) -> PlaceOrderRequest {
        PlaceOrderRequest {
            items,
            total: dec(total),
            shipping_address: "Av. Siempre Viva 742".into(),
        }
    }

    #[test]
    fn subtotal_is_quantity_times_unit_price() {
        let it = item(Uuid::new_v4(), 3, "19.99");
        assert_eq!(line_subtotal(&it), dec("59.97"));
    }

    #[test]
    fn validate_accepts_consistent_request() {
        let req = request(vec![item(Uuid::new_v4(), 2, "10.50")], "21.00");
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn validate_rejects_empty_items() {
        let req = request(vec![], "0");
        assert!(matches!(validate(&req), Err(OrderError::Validation(_))));
    }

    #[test]
    fn validate_rejects_non_positive_quantity() {
        let req = request(vec![item(Uuid::new_v4(), 0, "10.00")], "0.00");
        assert!(matches!(validate(&req), Err(OrderError::Validation(_))));
    }

    #[test]
    fn validate_rejects_negative_price() {
        let req = request(vec![item(Uuid::new_v4(), 1, "-1.00")], "-1.00");
        assert!(matches!(validate(&req), Err(OrderError::Validation(_))));
    }

    #[test]
    fn validate_rejects_blank_address() {
        let mut req = request(vec![item(Uuid::new_v4(), 1, "5.00")], "5.00");
        req.shipping_address = "   ".into();
        assert!(matches!(validate(&req), Err(OrderError::Validation(_))));
    }

    #[test]
    fn validate_rejects_total_mismatch() {
        let req = request(vec![item(Uuid::new_v4(), 2, "10.00")], "19.00");
        let err = validate(&req).unwrap_err();
        let msg = match err {
            OrderError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        };
        assert!(msg.contains("19.00"));
        assert!(msg.contains("20.00"));
    }

    #[test]
    fn lock_order_is_ascending_by_listing_id() {
        let a = Uuid::from_u128(3);
        let b = Uuid::from_u128(1);
        let c = Uuid::from_u128(2);
        let items = vec![item(a, 1, "1"), item(b, 1, "1"), item(c, 1, "1")];

        let sorted = sorted_by_listing(&items);
        let ids: Vec<Uuid> = sorted.iter().map(|i| i.listing_id).collect();
        assert_eq!(ids, vec![b, c, a]);
        // Caller order untouched
        assert_eq!(items[0].listing_id, a);
    }
}
