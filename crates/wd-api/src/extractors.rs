//! Axum extractors for API handlers

use axum::{
    async_trait,
    body::Body,
    extract::{ConnectInfo, FromRef, FromRequest, FromRequestParts, Query, Request},
    http::{header, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;
use std::net::{IpAddr, SocketAddr};
use std::ops::Deref;
use uuid::Uuid;
use validator::Validate;
use wd_auth::extract_bearer_token;
use wd_models::{validate_input, User};
use wd_services::{RequestContext, Services};

use crate::error::ApiError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

/// JSON body that has passed its `validator` rules
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        validate_input(&value)?;
        Ok(ValidJson(value))
    }
}

/// Upper bound on bodies buffered by `OptionalJson`
const OPTIONAL_BODY_LIMIT: usize = 64 * 1024;

/// Validated JSON body that may be left out entirely. Only an empty body
/// counts as absent; anything else must be well-formed JSON.
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, OPTIONAL_BODY_LIMIT)
            .await
            .map_err(|_| ApiError::bad_request("Failed to read request body"))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(None));
        }

        let req = Request::from_parts(parts, Body::from(bytes));
        let Json(value) = Json::<T>::from_request(req, state).await?;
        validate_input(&value)?;
        Ok(OptionalJson(Some(value)))
    }
}

/// JSON body whose rules are checked further down, by the service that
/// normalizes it first
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Query string with malformed input reported as 422
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ValidQuery(value))
    }
}

/// Parse a path id, mapping anything that is not a UUID to a 400
pub fn parse_id(raw: &str, message: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(message))
}

/// Client address and user agent of the current request
pub struct RequestInfo(pub RequestContext);

/// First address in a forwarding header, if it parses as an IP
fn forwarded_ip(parts: &Parts, name: &str) -> Option<IpAddr> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
}

/// Peer address, or the forwarded client when proxy headers are trusted
fn client_ip(parts: &Parts, trust_proxy_headers: bool) -> Option<String> {
    if trust_proxy_headers {
        let forwarded =
            forwarded_ip(parts, "x-forwarded-for").or_else(|| forwarded_ip(parts, "x-real-ip"));
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestInfo
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let trust_proxy_headers = AppState::from_ref(state)
            .services
            .config
            .server
            .trust_proxy_headers;
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(RequestInfo(RequestContext::new(
            client_ip(parts, trust_proxy_headers),
            user_agent,
        )))
    }
}

impl Deref for RequestInfo {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Authenticated user extractor
pub struct AuthenticatedUser {
    pub user: User,
    pub session_id: Option<Uuid>,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let principal = app_state.services.auth.resolve_access_token(token).await?;
        Ok(AuthenticatedUser {
            user: principal.user,
            session_id: principal.session_id,
        })
    }
}

impl Deref for AuthenticatedUser {
    type Target = User;
    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

/// Any admin tier or the superadmin
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let current = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !current.user.is_admin() {
            return Err(ApiError::forbidden("Not enough permissions"));
        }
        Ok(AdminUser(current))
    }
}

impl AdminUser {
    pub fn user(&self) -> &User {
        &self.0.user
    }
}

impl Deref for AdminUser {
    type Target = User;
    fn deref(&self) -> &Self::Target {
        &self.0.user
    }
}

pub struct SuperAdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for SuperAdminUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let current = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !current.user.is_superadmin() {
            return Err(ApiError::forbidden("Superadmin access required"));
        }
        Ok(SuperAdminUser(current))
    }
}

impl SuperAdminUser {
    pub fn user(&self) -> &User {
        &self.0.user
    }
}

impl Deref for SuperAdminUser {
    type Target = User;
    fn deref(&self) -> &Self::Target {
        &self.0.user
    }
}
