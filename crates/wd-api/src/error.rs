//! API error handling
//!
//! Every error renders as
//! `{"detail": ..., "code": ..., "status_code": ..., "errors": [...]}`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use wd_core::{ValidationErrors, WdError};

/// API error types
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Validation(ValidationErrors),
    Unauthorized(String),
    Locked(String),
    Forbidden(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        ApiError::NotFound(detail.into())
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        ApiError::Unauthorized(detail.into())
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        ApiError::Forbidden(detail.into())
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        ApiError::BadRequest(detail.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) | ApiError::Locked(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation_failed",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Locked(_) => "account_locked",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<WdError> for ApiError {
    fn from(err: WdError) -> Self {
        match err {
            WdError::NotFound { .. } => ApiError::NotFound(err.public_message()),
            WdError::Unauthorized(m) => ApiError::Unauthorized(m),
            WdError::Locked(m) => ApiError::Locked(m),
            WdError::Forbidden(m) => ApiError::Forbidden(m),
            WdError::BadRequest(m) => ApiError::BadRequest(m),
            WdError::Validation(errors) => ApiError::Validation(errors),
            WdError::Conflict(m) => ApiError::Conflict(m),
            WdError::Database(_) | WdError::Internal(_) | WdError::Config(_) => {
                tracing::error!(error = %err, "Request failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add("body", rejection.body_text());
        ApiError::Validation(errors)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add("query", rejection.body_text());
        ApiError::Validation(errors)
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    code: &'static str,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let (detail, errors) = match self {
            ApiError::Validation(errors) => {
                let mut fields: Vec<FieldError> = errors
                    .errors
                    .into_iter()
                    .flat_map(|(field, messages)| {
                        messages.into_iter().map(move |message| FieldError {
                            field: field.clone(),
                            message,
                        })
                    })
                    .collect();
                fields.extend(errors.base_errors.into_iter().map(|message| FieldError {
                    field: "base".to_string(),
                    message,
                }));
                ("Validation error".to_string(), Some(fields))
            }
            ApiError::Internal(_) => ("Internal server error".to_string(), None),
            ApiError::NotFound(m)
            | ApiError::Unauthorized(m)
            | ApiError::Locked(m)
            | ApiError::Forbidden(m)
            | ApiError::BadRequest(m)
            | ApiError::Conflict(m) => (m, None),
        };

        let body = ErrorBody {
            detail,
            code,
            status_code: status.as_u16(),
            errors,
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
