//! Administrator management, superadmin only

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use wd_core::{Page, WdError};
use wd_models::{AuditLog, CreateUser, UpdateUser, User};

use crate::error::{ApiError, ApiResult};
use crate::extractors::{parse_id, ApiJson, AppState, RequestInfo, SuperAdminUser, ValidQuery};
use crate::schemas::{AuditLogQuery, MessageResponse, RolesResponse, SystemStats, UserResponse};

const ADMIN_NOT_FOUND: &str = "Admin user not found";

/// Look up an account that holds one of the admin tiers
async fn load_admin(state: &AppState, raw_id: &str) -> ApiResult<User> {
    let id = parse_id(raw_id, "Invalid admin ID")?;
    match state.services.users.get_user(id).await {
        Ok(user) if user.role.is_admin_tier() => Ok(user),
        Ok(_) | Err(WdError::NotFound { .. }) => Err(ApiError::not_found(ADMIN_NOT_FOUND)),
        Err(err) => Err(err.into()),
    }
}

/// GET /api/v1/admin/admins
pub async fn list_admins(
    State(state): State<AppState>,
    _root: SuperAdminUser,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let admins = state.services.users.list_admins().await?;
    Ok(Json(admins.into_iter().map(UserResponse::from).collect()))
}

/// POST /api/v1/admin/admins
pub async fn create_admin(
    State(state): State<AppState>,
    root: SuperAdminUser,
    RequestInfo(ctx): RequestInfo,
    ApiJson(input): ApiJson<CreateUser>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    if !input.role.is_admin_tier() {
        return Err(ApiError::bad_request(
            "Role must be one of: admin1, admin2, admin3",
        ));
    }

    let user = state
        .services
        .users
        .create_user(input, Some(root.user()), &ctx)
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// GET /api/v1/admin/admins/:id
pub async fn get_admin(
    State(state): State<AppState>,
    _root: SuperAdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let admin = load_admin(&state, &id).await?;
    Ok(Json(UserResponse::from(admin)))
}

/// PUT /api/v1/admin/admins/:id
pub async fn update_admin(
    State(state): State<AppState>,
    root: SuperAdminUser,
    RequestInfo(ctx): RequestInfo,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UpdateUser>,
) -> ApiResult<Json<UserResponse>> {
    let admin = load_admin(&state, &id).await?;
    if patch.role.is_some_and(|role| !role.is_admin_tier()) {
        return Err(ApiError::bad_request(
            "Admin role must be one of: admin1, admin2, admin3",
        ));
    }

    let user = state
        .services
        .users
        .update_user(admin.id, patch, Some(root.user()), &ctx)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

/// DELETE /api/v1/admin/admins/:id
pub async fn delete_admin(
    State(state): State<AppState>,
    root: SuperAdminUser,
    RequestInfo(ctx): RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let admin = load_admin(&state, &id).await?;
    if admin.id == root.id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    state
        .services
        .users
        .delete_user(admin.id, Some(root.user()), &ctx)
        .await?;
    Ok(Json(MessageResponse::new("Admin user deleted successfully")))
}

/// POST /api/v1/admin/admins/:id/lock
pub async fn lock_admin(
    State(state): State<AppState>,
    root: SuperAdminUser,
    RequestInfo(ctx): RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let admin = load_admin(&state, &id).await?;
    if admin.id == root.id {
        return Err(ApiError::bad_request("Cannot lock your own account"));
    }

    state
        .services
        .users
        .lock_user(admin.id, Some(root.user()), &ctx)
        .await?;
    Ok(Json(MessageResponse::new("Admin user locked successfully")))
}

/// POST /api/v1/admin/admins/:id/unlock
pub async fn unlock_admin(
    State(state): State<AppState>,
    root: SuperAdminUser,
    RequestInfo(ctx): RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let admin = load_admin(&state, &id).await?;
    state
        .services
        .users
        .unlock_user(admin.id, Some(root.user()), &ctx)
        .await?;
    Ok(Json(MessageResponse::new("Admin user unlocked successfully")))
}

/// GET /api/v1/admin/system/stats
pub async fn system_stats(
    State(state): State<AppState>,
    _root: SuperAdminUser,
) -> ApiResult<Json<SystemStats>> {
    let users = &state.services.users;
    let user_stats = users.stats().await?;
    let admin_stats = users.admin_stats().await?;
    Ok(Json(SystemStats::new(user_stats, &admin_stats)))
}

/// GET /api/v1/admin/audit-logs
pub async fn audit_logs(
    State(state): State<AppState>,
    _root: SuperAdminUser,
    ValidQuery(query): ValidQuery<AuditLogQuery>,
) -> ApiResult<Json<Page<AuditLog>>> {
    let page = state
        .services
        .audit
        .list(&query.filter(None), &query.page_params())
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/admin/roles
pub async fn roles(_root: SuperAdminUser) -> Json<RolesResponse> {
    Json(RolesResponse::new())
}
