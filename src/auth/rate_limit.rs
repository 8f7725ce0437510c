//! Application-layer rate limiting for login and registration routes

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Per-route quota: at most `max_requests` per `window` per client IP.
#[derive(Clone, Copy)]
struct Quota {
    route: &'static str,
    max_requests: u32,
    window: Duration,
}

const LOGIN_QUOTA: Quota = Quota {
    route: "login",
    max_requests: 5,
    window: Duration::from_secs(60),
};

const REGISTER_QUOTA: Quota = Quota {
    route: "registro",
    max_requests: 3,
    window: Duration::from_secs(60),
};

/// Entries idle longer than this are dropped by `cleanup`.
const STALE_AFTER: Duration = Duration::from_secs(300);

struct Window {
    count: u32,
    started: Instant,
}

/// Fixed-window counter keyed by (route, client IP).
#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<(&'static str, String), Window>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request against the quota; `true` means allowed.
    async fn allow(&self, quota: Quota, ip: &str) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();

        let window = windows
            .entry((quota.route, ip.to_owned()))
            .or_insert(Window {
                count: 0,
                started: now,
            });

        if now.duration_since(window.started) >= quota.window {
            window.count = 0;
            window.started = now;
        }

        window.count += 1;
        window.count <= quota.max_requests
    }

    /// Drop windows that have been idle past [`STALE_AFTER`].
    pub async fn cleanup(&self) {
        let now = Instant::now();
        self.windows
            .lock()
            .await
            .retain(|_, w| now.duration_since(w.started) < STALE_AFTER);
    }
}

/// Extract client IP: X-Forwarded-For header first (reverse proxy), then peer address.
fn client_ip(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        // comma-separated; first entry is the original client
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match forwarded {
        Some(ip) => ip.to_owned(),
        None => request
            .extensions()
            .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_owned()),
    }
}

async fn enforce(
    state: &crate::state::AppState,
    quota: Quota,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = client_ip(&request);
    if !state.rate_limiter.allow(quota, &ip).await {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(serde_json::json!({"error": "Too many requests, try again later"})),
        )
            .into_response());
    }
    Ok(next.run(request).await)
}

/// Rate limit middleware for POST /api/login
pub async fn login_rate_limit(
    State(state): State<crate::state::AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    enforce(&state, LOGIN_QUOTA, request, next).await
}

/// Rate limit middleware for POST /api/registro
pub async fn register_rate_limit(
    State(state): State<crate::state::AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    enforce(&state, REGISTER_QUOTA, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_after_quota_and_isolates_ips() {
        let limiter = RateLimiter::new();
        let quota = Quota {
            route: "login",
            max_requests: 3,
            window: Duration::from_secs(60),
        };
        for _ in 0..3 {
            assert!(limiter.allow(quota, "10.0.0.1").await);
        }
        assert!(!limiter.allow(quota, "10.0.0.1").await);
        assert!(limiter.allow(quota, "10.0.0.2").await);
    }

    #[tokio::test]
    async fn routes_have_independent_windows() {
        let limiter = RateLimiter::new();
        let a = Quota {
            route: "login",
            max_requests: 1,
            window: Duration::from_secs(60),
        };
        let b = Quota {
            route: "registro",
            max_requests: 1,
            window: Duration::from_secs(60),
        };
        assert!(limiter.allow(a, "10.0.0.1").await);
        assert!(!limiter.allow(a, "10.0.0.1").await);
        assert!(limiter.allow(b, "10.0.0.1").await);
    }
}
