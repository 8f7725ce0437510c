//! User database operations

use sqlx::PgPool;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub struct Usuario {
    pub id: Uuid,
    pub nombre: String,
    pub email: String,
    pub hashed_password: String,
    pub created_at: i64,
}

pub async fn create(
    pool: &PgPool,
    id: Uuid,
    nombre: &str,
    email: &str,
    hashed_password: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO usuarios (id, nombre, email, hashed_password, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(nombre)
    .bind(email)
    .bind(hashed_password)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Usuario>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM usuarios WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}
