//! Listing endpoints: public reads, seller-owned writes

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::UserIdentity;
use crate::db;
use crate::db::listings::ListingInput;
use crate::error::{ApiResult, AppError, ErrorCode};
use crate::state::AppState;
use crate::util::now_millis;

#[derive(Deserialize)]
pub struct ListingRequest {
    pub titulo: String,
    #[serde(default)]
    pub descripcion: String,
    pub precio: Decimal,
    pub stock: i32,
}

impl ListingRequest {
    fn into_input(self) -> Result<ListingInput, AppError> {
        let titulo = self.titulo.trim().to_string();
        if titulo.is_empty() {
            return Err(AppError::with_message(
                ErrorCode::Validation,
                "Title is required",
            ));
        }
        if self.precio.is_sign_negative() {
            return Err(AppError::with_message(
                ErrorCode::Validation,
                "Price must not be negative",
            ));
        }
        if self.stock < 0 {
            return Err(AppError::with_message(
                ErrorCode::Validation,
                "Stock must not be negative",
            ));
        }
        Ok(ListingInput {
            titulo,
            descripcion: self.descripcion.trim().to_string(),
            precio: self.precio,
            stock: self.stock,
        })
    }
}

/// GET /api/publicaciones
pub async fn list_listings(
    State(state): State<AppState>,
) -> ApiResult<Vec<db::listings::Publicacion>> {
    let listings = db::listings::list_active(&state.pool).await.map_err(|e| {
        tracing::error!("Listings query error: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;
    Ok(Json(listings))
}

/// GET /api/publicaciones/{id}
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<db::listings::Publicacion> {
    let listing = db::listings::get(&state.pool, id)
        .await
        .map_err(|e| {
            tracing::error!("Listing query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::with_message(ErrorCode::NotFound, "Listing not found"))?;
    Ok(Json(listing))
}

/// POST /api/publicaciones
pub async fn create_listing(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(req): Json<ListingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = req.into_input()?;
    let id = Uuid::new_v4();

    db::listings::create(&state.pool, id, identity.user_id, &input, now_millis())
        .await
        .map_err(|e| {
            tracing::error!("Listing create error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// PUT /api/publicaciones/{id}
pub async fn update_listing(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<Uuid>,
    Json(req): Json<ListingRequest>,
) -> ApiResult<serde_json::Value> {
    let input = req.into_input()?;

    let updated = db::listings::update(&state.pool, id, identity.user_id, &input)
        .await
        .map_err(|e| {
            tracing::error!("Listing update error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;

    if !updated {
        return Err(AppError::with_message(
            ErrorCode::NotFound,
            "Listing not found or not yours",
        ));
    }
    Ok(Json(json!({ "id": id, "message": "updated" })))
}

/// DELETE /api/publicaciones/{id}
pub async fn delete_listing(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let deleted = db::listings::delete(&state.pool, id, identity.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Listing delete error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?;

    if !deleted {
        return Err(AppError::with_message(
            ErrorCode::NotFound,
            "Listing not found or not yours",
        ));
    }
    Ok(Json(json!({ "id": id, "message": "deleted" })))
}
