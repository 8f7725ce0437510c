//! Application state

use sqlx::PgPool;

use crate::auth::rate_limit::RateLimiter;
use crate::config::Config;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state, cloned into every handler.
///
/// The storage handle is injected here rather than held as process-wide
/// mutable state; each call acquires a connection or transaction from the
/// pool and the guard releases it on every exit path.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// JWT secret for user authentication
    pub jwt_secret: String,
    /// Rate limiter for login/registration routes
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool,
            jwt_secret: config.jwt_secret.clone(),
            rate_limiter: RateLimiter::new(),
        })
    }
}
