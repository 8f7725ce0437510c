//! API routes for repuestos-cloud

pub mod auth;
pub mod health;
pub mod listings;
pub mod orders;

use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::rate_limit;
use crate::auth::user_auth::user_auth_middleware;
use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Account creation / login (rate-limited, no auth)
    let registration = Router::new()
        .route("/api/registro", post(auth::register))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::register_rate_limit,
        ));
    let login = Router::new()
        .route("/api/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::login_rate_limit,
        ));

    // Listings: reads are public, writes authenticate via the UserIdentity
    // extractor inside the handlers
    let listings = Router::new()
        .route(
            "/api/publicaciones",
            get(listings::list_listings).post(listings::create_listing),
        )
        .route(
            "/api/publicaciones/{id}",
            get(listings::get_listing)
                .put(listings::update_listing)
                .delete(listings::delete_listing),
        );

    // Orders (JWT authenticated)
    let pedidos = Router::new()
        .route(
            "/api/pedidos",
            post(orders::create_order).get(orders::list_my_orders),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            user_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(registration)
        .merge(login)
        .merge(listings)
        .merge(pedidos)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
