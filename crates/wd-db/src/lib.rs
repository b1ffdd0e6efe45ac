//! # wd-db
//!
//! Database layer for Warden.
//!
//! This crate provides PostgreSQL access using SQLx, including:
//!
//! - Connection pool management and embedded migrations
//! - Store traits for users, sessions, audit logs and password resets
//! - Postgres implementations of every store
//! - In-memory implementations with the same semantics, for tests and local runs
//!
//! ## Example
//!
//! ```ignore
//! use wd_db::{Database, Stores};
//!
//! let db = Database::connect(&config.database).await?;
//! db.migrate().await?;
//!
//! let stores = Stores::postgres(&db);
//! let user = stores.users.find_by_email("admin@example.com").await?;
//! ```

pub mod audit;
pub mod memory;
pub mod password_resets;
pub mod pool;
pub mod repository;
pub mod sessions;
pub mod store;
pub mod users;

// Re-exports
pub use audit::PgAuditStore;
pub use memory::{MemoryAuditStore, MemoryPasswordResetStore, MemorySessionStore, MemoryUserStore};
pub use password_resets::PgPasswordResetStore;
pub use pool::{Database, PoolStats};
pub use repository::{RepositoryError, RepositoryResult};
pub use sessions::PgSessionStore;
pub use store::{AuditStore, PasswordResetStore, SessionStore, Stores, UserStore};
pub use users::{PgUserStore, UserRow};
