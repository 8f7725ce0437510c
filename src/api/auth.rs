//! Account endpoints: registration and login
//!
//! POST /api/registro — create a user account
//! POST /api/login    — exchange credentials for a JWT

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::user_auth::create_token;
use crate::db;
use crate::error::{AppError, ApiResult, ErrorCode};
use crate::state::AppState;
use crate::util::{hash_password, now_millis, verify_password};

// ── Request / Response types ──

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub nombre: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(serde::Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub usuario: UsuarioView,
}

#[derive(serde::Serialize)]
pub struct UsuarioView {
    pub id: Uuid,
    pub nombre: String,
    pub email: String,
}

// ── POST /api/registro ──

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let email = req.email.trim().to_lowercase();
    let nombre = req.nombre.trim().to_string();

    // Validate
    if nombre.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Name is required");
    }
    if email.is_empty() || !email.contains('@') {
        return error_response(StatusCode::BAD_REQUEST, "Invalid email");
    }
    if req.password.len() < 8 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters",
        );
    }

    // Check email not taken
    match db::users::find_by_email(&state.pool, &email).await {
        Ok(Some(_)) => {
            return error_response(StatusCode::CONFLICT, "Email already registered");
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(%e, "DB error checking email");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    }

    // Hash password
    let hashed_password = match hash_password(&req.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(%e, "Password hash error");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    };

    let id = Uuid::new_v4();
    if let Err(e) = db::users::create(&state.pool, id, &nombre, &email, &hashed_password, now_millis()).await
    {
        tracing::error!(%e, "DB error creating user");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
    }

    (
        StatusCode::CREATED,
        Json(json!({ "id": id, "email": email })),
    )
}

fn error_response(status: StatusCode, msg: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": msg })))
}

// ── POST /api/login ──

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let email = req.email.trim().to_lowercase();
    let user = db::users::find_by_email(&state.pool, &email)
        .await
        .map_err(|e| {
            tracing::error!("DB error during login: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::with_message(ErrorCode::Unauthorized, "Invalid credentials"))?;

    if !verify_password(&req.password, &user.hashed_password) {
        return Err(AppError::with_message(
            ErrorCode::Unauthorized,
            "Invalid credentials",
        ));
    }

    let token = create_token(user.id, &user.email, &state.jwt_secret).map_err(|e| {
        tracing::error!("JWT creation failed: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;

    Ok(Json(LoginResponse {
        token,
        usuario: UsuarioView {
            id: user.id,
            nombre: user.nombre,
            email: user.email,
        },
    }))
}
