//! # wd-api
//!
//! REST API for Warden, served under `/api/v1`.
//!
//! - `/auth`: login, refresh, logout, password reset, sessions
//! - `/users`: user administration and self-service profile
//! - `/admin`: administrator management, superadmin only

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod schemas;

#[cfg(test)]
mod test_support;

pub use error::{ApiError, ApiResult};
pub use extractors::AppState;
pub use routes::router;
