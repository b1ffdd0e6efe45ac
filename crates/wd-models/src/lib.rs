//! # wd-models
//!
//! Domain models for Warden.
//!
//! Entities mirror the `users`, `user_sessions`, `audit_logs` and
//! `password_resets` tables. Input types carry `validator` rules shared by the
//! service layer and the HTTP request schemas.

pub mod audit;
pub mod inputs;
pub mod password_reset;
pub mod session;
pub mod stats;
pub mod user;

pub use audit::*;
pub use inputs::*;
pub use password_reset::*;
pub use session::*;
pub use stats::*;
pub use user::*;
