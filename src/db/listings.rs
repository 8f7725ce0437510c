//! Listing (publicación) database operations
//!
//! All seller mutations enforce ownership in the WHERE clause; a zero
//! rows-affected result means "not yours or not there" and the caller maps
//! it to 404/403 as appropriate.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Active listing as exposed by the public read endpoints.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct Publicacion {
    pub id: Uuid,
    pub usuario_id: Uuid,
    pub titulo: String,
    pub descripcion: String,
    pub precio: Decimal,
    pub stock: i32,
    pub estado: String,
    pub created_at: i64,
}

/// Fields a seller provides when creating or replacing a listing.
pub struct ListingInput {
    pub titulo: String,
    pub descripcion: String,
    pub precio: Decimal,
    pub stock: i32,
}

pub async fn list_active(pool: &PgPool) -> Result<Vec<Publicacion>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM publicaciones WHERE estado = 'activa' ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Publicacion>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM publicaciones WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    id: Uuid,
    seller_id: Uuid,
    input: &ListingInput,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO publicaciones (id, usuario_id, titulo, descripcion, precio, stock, estado, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, 'activa', $7)",
    )
    .bind(id)
    .bind(seller_id)
    .bind(&input.titulo)
    .bind(&input.descripcion)
    .bind(input.precio)
    .bind(input.stock)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update a listing owned by `seller_id`. Returns `false` when no row
/// matched (absent listing or different owner).
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    seller_id: Uuid,
    input: &ListingInput,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE publicaciones
         SET titulo = $1, descripcion = $2, precio = $3, stock = $4
         WHERE id = $5 AND usuario_id = $6",
    )
    .bind(&input.titulo)
    .bind(&input.descripcion)
    .bind(input.precio)
    .bind(input.stock)
    .bind(id)
    .bind(seller_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Soft-delete: mark the listing inactive so existing order lines keep a
/// valid reference. Returns `false` when no row matched.
pub async fn delete(pool: &PgPool, id: Uuid, seller_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE publicaciones SET estado = 'eliminada' WHERE id = $1 AND usuario_id = $2",
    )
    .bind(id)
    .bind(seller_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
