//! User JWT authentication for the marketplace API
//!
//! Two entry points over the same verification path: a router middleware
//! that stashes the verified [`UserIdentity`] in request extensions, and a
//! `FromRequestParts` extractor for handlers outside a middleware-protected
//! subrouter. The extractor checks extensions first so both compose.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, ErrorCode};
use crate::state::AppState;

/// JWT claims for user authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaims {
    /// User id
    pub sub: String,
    /// User email
    pub email: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Authenticated user identity extracted from JWT
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub email: String,
}

const JWT_EXPIRY_HOURS: i64 = 24;

/// Create a JWT token for a user
pub fn create_token(
    user_id: Uuid,
    email: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = UserClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify a `Authorization: Bearer <jwt>` header value against the secret.
fn verify_bearer(auth_header: Option<&str>, secret: &str) -> Result<UserIdentity, AppError> {
    let auth_header = auth_header
        .ok_or_else(|| AppError::with_message(ErrorCode::Unauthorized, "Missing Authorization header"))?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::with_message(ErrorCode::Unauthorized, "Invalid Authorization format")
    })?;

    let token_data = jsonwebtoken::decode::<UserClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        AppError::with_message(ErrorCode::InvalidToken, "Invalid or expired token")
    })?;

    let user_id = token_data
        .claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| AppError::with_message(ErrorCode::InvalidToken, "Invalid or expired token"))?;

    Ok(UserIdentity {
        user_id,
        email: token_data.claims.email,
    })
}

/// Middleware that verifies the user JWT and inserts [`UserIdentity`] into
/// request extensions.
pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let identity =
        verify_bearer(auth_header, &state.jwt_secret).map_err(IntoResponse::into_response)?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

impl FromRequestParts<AppState> for UserIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already verified by the middleware
        if let Some(identity) = parts.extensions.get::<UserIdentity>() {
            return Ok(identity.clone());
        }

        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let identity = verify_bearer(auth_header, &state.jwt_secret)?;

        // Store for potential reuse
        parts.extensions.insert(identity.clone());

        Ok(identity)
    }
}
