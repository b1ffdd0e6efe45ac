//! Core error types for Warden

use std::collections::BTreeMap;
use thiserror::Error;

/// Standard Result type for Warden operations
pub type WdResult<T> = Result<T, WdError>;

/// Core error type shared by services and the HTTP layer
#[derive(Error, Debug)]
pub enum WdError {
    #[error("Not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Account locked: {0}")]
    Locked(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WdError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        WdError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        WdError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        WdError::Forbidden(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        WdError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        WdError::Internal(message.into())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            WdError::NotFound { .. } => 404,
            WdError::Unauthorized(_) | WdError::Locked(_) => 401,
            WdError::Forbidden(_) => 403,
            WdError::BadRequest(_) => 400,
            WdError::Validation(_) => 422,
            WdError::Conflict(_) => 409,
            WdError::Database(_) | WdError::Internal(_) | WdError::Config(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            WdError::NotFound { .. } => "not_found",
            WdError::Unauthorized(_) => "unauthorized",
            WdError::Forbidden(_) => "forbidden",
            WdError::BadRequest(_) => "bad_request",
            WdError::Validation(_) => "validation_failed",
            WdError::Conflict(_) => "conflict",
            WdError::Locked(_) => "account_locked",
            WdError::Database(_) => "database_error",
            WdError::Internal(_) => "internal_error",
            WdError::Config(_) => "configuration_error",
        }
    }

    /// Message safe to show to API clients
    pub fn public_message(&self) -> String {
        match self {
            WdError::NotFound { entity, .. } => format!("{} not found", entity),
            WdError::Unauthorized(m)
            | WdError::Forbidden(m)
            | WdError::BadRequest(m)
            | WdError::Conflict(m)
            | WdError::Locked(m) => m.clone(),
            WdError::Validation(_) => "Validation error".to_string(),
            WdError::Database(_) | WdError::Internal(_) | WdError::Config(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

/// Validation errors collection
#[derive(Error, Debug, Default, Clone, PartialEq)]
#[error("{}", self.full_messages().join(", "))]
pub struct ValidationErrors {
    /// Field-specific errors: field_name -> messages
    pub errors: BTreeMap<String, Vec<String>>,
    /// Errors not tied to a specific field
    pub base_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single field error
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base_errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.base_errors.is_empty()
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.errors.get(field)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self.base_errors.extend(other.base_errors);
    }

    /// Turn the collection into a `Result`, failing if anything was recorded
    pub fn into_result(self) -> WdResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(WdError::Validation(self))
        }
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = self.base_errors.clone();
        for (field, field_messages) in &self.errors {
            for msg in field_messages {
                messages.push(format!("{} {}", field, msg));
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(WdError::not_found("User", 1).status_code(), 404);
        assert_eq!(WdError::unauthorized("nope").status_code(), 401);
        assert_eq!(WdError::Locked("locked".into()).status_code(), 401);
        assert_eq!(WdError::forbidden("nope").status_code(), 403);
        assert_eq!(WdError::Validation(ValidationErrors::new()).status_code(), 422);
        assert_eq!(WdError::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = WdError::Database("relation users does not exist".into());
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_validation_errors() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add("email", "is invalid");
        errors.add_base("Passwords do not match");

        assert!(errors.has_error("email"));
        assert_eq!(
            errors.full_messages(),
            vec!["Passwords do not match".to_string(), "email is invalid".to_string()]
        );
        assert!(errors.into_result().is_err());
    }
}
