//! Order endpoints: place an order, list the caller's orders
//!
//! POST /api/pedidos — run the placement transaction for the authenticated
//! buyer; GET /api/pedidos — order history with nested line items.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::UserIdentity;
use crate::db::orders::{self, OrderItemRequest, PlaceOrderRequest};
use crate::error::{ApiResult, AppError, ErrorCode};
use crate::state::AppState;

// ── Wire types (original API field names) ──

#[derive(Deserialize)]
pub struct PedidoItem {
    pub id_publicacion: Uuid,
    pub cantidad: i32,
    pub precio: Decimal,
}

#[derive(Deserialize)]
pub struct PedidoRequest {
    pub items: Vec<PedidoItem>,
    pub total: Decimal,
    pub direccion_envio: String,
}

impl From<PedidoRequest> for PlaceOrderRequest {
    fn from(req: PedidoRequest) -> Self {
        PlaceOrderRequest {
            items: req
                .items
                .into_iter()
                .map(|i| OrderItemRequest {
                    listing_id: i.id_publicacion,
                    quantity: i.cantidad,
                    unit_price: i.precio,
                })
                .collect(),
            total: req.total,
            shipping_address: req.direccion_envio,
        }
    }
}

/// POST /api/pedidos
pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(req): Json<PedidoRequest>,
) -> Result<impl IntoResponse, AppError> {
    let request: PlaceOrderRequest = req.into();

    let receipt = orders::place_order(&state.pool, identity.user_id, &request).await?;

    tracing::info!(
        order_id = %receipt.id,
        buyer_id = %identity.user_id,
        total = %receipt.total,
        "Order placed"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Pedido creado exitosamente",
            "pedido": receipt,
        })),
    ))
}

/// GET /api/pedidos
pub async fn list_my_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<Vec<orders::OrderSummary>> {
    let summaries = orders::list_orders(&state.pool, identity.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Order history query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;
    Ok(Json(summaries))
}
