//! API handlers

pub mod admin;
pub mod auth;
pub mod users;
