//! # wd-auth
//!
//! Authentication and authorization for Warden.
//!
//! ## Features
//!
//! - JWT access, refresh, password-reset and email-verification tokens
//! - Argon2id password hashing and a configurable password policy
//! - Role-based permission checks between users

pub mod password;
pub mod permissions;
pub mod tokens;

pub use password::{hash_password, verify_password, PasswordError, PasswordPolicy, PasswordStrength};
pub use permissions::PermissionChecker;
pub use tokens::{extract_bearer_token, fingerprint, Claims, TokenError, TokenKind, TokenService};
