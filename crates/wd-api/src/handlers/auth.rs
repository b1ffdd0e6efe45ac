//! Authentication handlers
//!
//! Login, token refresh, logout, password reset and session management.

use axum::{
    extract::{Path, State},
    Json,
};
use wd_models::ResetPassword;

use crate::error::ApiResult;
use crate::extractors::{
    parse_id, AppState, AuthenticatedUser, OptionalJson, RequestInfo, ValidJson,
};
use crate::schemas::{
    LoginRequest, LogoutRequest, MessageResponse, PasswordResetRequest, RefreshRequest,
    RefreshResponse, SessionResponse, SessionsResponse, TokenResponse, TokenUser, UserProfile,
    VerifyEmailRequest, VerifyTokenResponse, TOKEN_TYPE,
};

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    RequestInfo(ctx): RequestInfo,
    ValidJson(body): ValidJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let (user, tokens) = state
        .services
        .auth
        .login(&body.email, &body.password, body.remember_me, &ctx)
        .await?;

    Ok(Json(TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: TOKEN_TYPE,
        expires_in: tokens.expires_in,
        user: UserProfile::from(user),
    }))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    RequestInfo(ctx): RequestInfo,
    ValidJson(body): ValidJson<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let refreshed = state.services.auth.refresh(&body.refresh_token, &ctx).await?;
    Ok(Json(RefreshResponse {
        access_token: refreshed.access_token,
        refresh_token: refreshed.refresh_token,
        token_type: TOKEN_TYPE,
        expires_in: refreshed.expires_in,
    }))
}

/// POST /api/v1/auth/logout
///
/// The body is optional; without one every session of the caller ends.
pub async fn logout(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    RequestInfo(ctx): RequestInfo,
    OptionalJson(body): OptionalJson<LogoutRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let body = body.unwrap_or_default();
    state
        .services
        .auth
        .logout(
            &current.user,
            body.refresh_token.as_deref(),
            body.logout_all_devices,
            &ctx,
        )
        .await?;
    Ok(Json(MessageResponse::new("Successfully logged out")))
}

/// GET /api/v1/auth/me
pub async fn me(current: AuthenticatedUser) -> Json<UserProfile> {
    Json(UserProfile::from(current.user))
}

/// POST /api/v1/auth/password-reset
///
/// Always answers the same way so callers cannot enumerate accounts.
pub async fn request_password_reset(
    State(state): State<AppState>,
    RequestInfo(ctx): RequestInfo,
    ValidJson(body): ValidJson<PasswordResetRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .services
        .auth
        .request_password_reset(&body.email, &ctx)
        .await?;
    Ok(Json(MessageResponse::new(
        "If the email exists, a password reset link has been sent",
    )))
}

/// POST /api/v1/auth/password-reset/confirm
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    RequestInfo(ctx): RequestInfo,
    ValidJson(body): ValidJson<ResetPassword>,
) -> ApiResult<Json<MessageResponse>> {
    state.services.auth.reset_password(body, &ctx).await?;
    Ok(Json(MessageResponse::new(
        "Password has been reset successfully",
    )))
}

/// POST /api/v1/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    RequestInfo(ctx): RequestInfo,
    ValidJson(body): ValidJson<VerifyEmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.services.users.verify_email(&body.token, &ctx).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// GET /api/v1/auth/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    current: AuthenticatedUser,
) -> ApiResult<Json<SessionsResponse>> {
    let sessions = state
        .services
        .auth
        .sessions(current.user.id, current.session_id)
        .await?;
    Ok(Json(SessionsResponse {
        sessions: sessions.into_iter().map(SessionResponse::from).collect(),
    }))
}

/// DELETE /api/v1/auth/sessions/:id
pub async fn revoke_session(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    RequestInfo(ctx): RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let session_id = parse_id(&id, "Invalid session ID")?;
    state
        .services
        .auth
        .revoke_session(&current.user, session_id, &ctx)
        .await?;
    Ok(Json(MessageResponse::new("Session revoked successfully")))
}

/// POST /api/v1/auth/verify-token
pub async fn verify_token(current: AuthenticatedUser) -> Json<VerifyTokenResponse> {
    let user = current.user;
    Json(VerifyTokenResponse {
        valid: true,
        user: TokenUser {
            id: user.id,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
        },
    })
}
