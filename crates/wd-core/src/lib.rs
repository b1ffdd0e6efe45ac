//! # wd-core
//!
//! Core types, errors, and configuration for Warden.
//!
//! This crate provides the foundational building blocks used across all other crates:
//! - The common error type and result alias
//! - Roles and the permissions they grant
//! - Pagination types
//! - Application configuration

pub mod config;
pub mod error;
pub mod pagination;
pub mod types;

pub use error::*;
pub use pagination::*;
pub use types::*;
