//! repuestos-cloud — REST backend for a vehicle spare-parts marketplace
//!
//! Long-running service that:
//! - Manages user accounts (argon2 passwords, JWT sessions)
//! - Serves listing CRUD for sellers and public listing reads
//! - Places orders atomically with exclusive per-listing stock locking

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod util;

pub use auth::UserIdentity;
pub use config::Config;
pub use error::{ApiResult, AppError, ErrorCode, OrderError};
pub use state::AppState;
