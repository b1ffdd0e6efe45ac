//! User management handlers
//!
//! Administrators manage plain users here; every signed-in user manages
//! their own profile under `/me`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use wd_auth::PermissionChecker;
use wd_core::{Page, Role};
use wd_models::{AuditLog, ChangePassword, CreateUser, UpdateProfile, UpdateUser, User, UserStats};

use crate::error::{ApiError, ApiResult};
use crate::extractors::{
    parse_id, AdminUser, ApiJson, AppState, AuthenticatedUser, RequestInfo, ValidQuery,
};
use crate::schemas::{AuditLogQuery, MessageResponse, UserListItem, UserListQuery, UserProfile, UserResponse};

const INVALID_USER_ID: &str = "Invalid user ID";

async fn load_target(state: &AppState, raw_id: &str) -> ApiResult<User> {
    let id = parse_id(raw_id, INVALID_USER_ID)?;
    Ok(state.services.users.get_user(id).await?)
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    admin: AdminUser,
    RequestInfo(ctx): RequestInfo,
    ApiJson(input): ApiJson<CreateUser>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    if !PermissionChecker::new(&admin).can_assign_role(input.role) {
        return Err(ApiError::forbidden(format!("Cannot assign role '{}'", input.role)));
    }

    let user = state
        .services
        .users
        .create_user(input, Some(admin.user()), &ctx)
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// GET /api/v1/users
///
/// Only the superadmin sees beyond plain users.
pub async fn list_users(
    State(state): State<AppState>,
    admin: AdminUser,
    ValidQuery(query): ValidQuery<UserListQuery>,
) -> ApiResult<Json<Page<UserListItem>>> {
    let mut filter = query.filter();
    if !admin.is_superadmin() {
        filter.role = Some(Role::User);
    }

    let page = state
        .services
        .users
        .search_users(&filter, &query.page_params())
        .await?;
    Ok(Json(page.map(UserListItem::from)))
}

/// GET /api/v1/users/stats
pub async fn user_stats(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<UserStats>> {
    Ok(Json(state.services.users.stats().await?))
}

/// GET /api/v1/users/me
pub async fn get_me(current: AuthenticatedUser) -> Json<UserProfile> {
    Json(UserProfile::from(current.user))
}

/// PUT /api/v1/users/me
pub async fn update_me(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    RequestInfo(ctx): RequestInfo,
    ApiJson(patch): ApiJson<UpdateProfile>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .services
        .users
        .update_profile(current.user.id, patch, &ctx)
        .await?;
    Ok(Json(UserProfile::from(user)))
}

/// POST /api/v1/users/me/change-password
pub async fn change_my_password(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    RequestInfo(ctx): RequestInfo,
    ApiJson(input): ApiJson<ChangePassword>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .services
        .users
        .change_password(current.user.id, input, &ctx)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let target = load_target(&state, &id).await?;
    if !PermissionChecker::new(&admin).can_view_user(&target) {
        return Err(ApiError::forbidden("Not enough permissions to view this user"));
    }
    Ok(Json(UserResponse::from(target)))
}

/// PUT /api/v1/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    admin: AdminUser,
    RequestInfo(ctx): RequestInfo,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UpdateUser>,
) -> ApiResult<Json<UserResponse>> {
    let target = load_target(&state, &id).await?;
    let checker = PermissionChecker::new(&admin);
    if !checker.can_manage_user(&target) {
        return Err(ApiError::forbidden("Not enough permissions to update this user"));
    }
    if let Some(role) = patch.role {
        if !checker.can_assign_role(role) {
            return Err(ApiError::forbidden(format!("Cannot assign role '{}'", role)));
        }
    }

    let user = state
        .services
        .users
        .update_user(target.id, patch, Some(admin.user()), &ctx)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

/// DELETE /api/v1/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    RequestInfo(ctx): RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let target = load_target(&state, &id).await?;
    if !PermissionChecker::new(&admin).can_manage_user(&target) {
        return Err(ApiError::forbidden("Not enough permissions to delete this user"));
    }
    if target.id == admin.id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    state
        .services
        .users
        .delete_user(target.id, Some(admin.user()), &ctx)
        .await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// POST /api/v1/users/:id/lock
pub async fn lock_user(
    State(state): State<AppState>,
    admin: AdminUser,
    RequestInfo(ctx): RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let target = load_target(&state, &id).await?;
    if !PermissionChecker::new(&admin).can_manage_user(&target) {
        return Err(ApiError::forbidden("Not enough permissions to lock this user"));
    }
    if target.id == admin.id {
        return Err(ApiError::bad_request("Cannot lock your own account"));
    }

    state
        .services
        .users
        .lock_user(target.id, Some(admin.user()), &ctx)
        .await?;
    Ok(Json(MessageResponse::new("User locked successfully")))
}

/// POST /api/v1/users/:id/unlock
pub async fn unlock_user(
    State(state): State<AppState>,
    admin: AdminUser,
    RequestInfo(ctx): RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let target = load_target(&state, &id).await?;
    if !PermissionChecker::new(&admin).can_manage_user(&target) {
        return Err(ApiError::forbidden("Not enough permissions to unlock this user"));
    }

    state
        .services
        .users
        .unlock_user(target.id, Some(admin.user()), &ctx)
        .await?;
    Ok(Json(MessageResponse::new("User unlocked successfully")))
}

/// GET /api/v1/users/:id/audit-logs
///
/// Entries the user performed, newest first.
pub async fn user_audit_logs(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    ValidQuery(query): ValidQuery<AuditLogQuery>,
) -> ApiResult<Json<Page<AuditLog>>> {
    let checker = PermissionChecker::new(&admin);
    if !checker.can_access_audit_logs() {
        return Err(ApiError::forbidden("Not enough permissions to view audit logs"));
    }
    let target = load_target(&state, &id).await?;
    if !checker.can_view_user(&target) {
        return Err(ApiError::forbidden(
            "Not enough permissions to view this user's audit logs",
        ));
    }

    let page = state
        .services
        .users
        .audit_logs(&query.filter(Some(target.id)), &query.page_params())
        .await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{TestApp, PASSWORD};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use wd_core::Role;

    fn new_user(email: &str, role: &str) -> serde_json::Value {
        json!({
            "email": email,
            "first_name": "New",
            "last_name": "Person",
            "role": role,
            "password": PASSWORD,
            "confirm_password": PASSWORD,
        })
    }

    #[tokio::test]
    async fn test_plain_user_cannot_administer() {
        let t = TestApp::new();
        let (_, token) = t.signed_in("plain@example.com", Role::User).await;

        let (status, body) = t.get("/api/v1/users", Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["detail"], "Not enough permissions");
    }

    #[tokio::test]
    async fn test_admin_creates_plain_users_only() {
        let t = TestApp::new();
        let (_, token) = t.signed_in("admin@example.com", Role::Admin1).await;

        let (status, body) = t
            .post("/api/v1/users", Some(&token), new_user("new@example.com", "user"))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["email"], "new@example.com");
        assert_eq!(body["role"], "user");
        assert_eq!(body["is_verified"], false);

        let (status, body) = t
            .post("/api/v1/users", Some(&token), new_user("boss@example.com", "admin1"))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["detail"], "Cannot assign role 'admin1'");

        let (status, body) = t
            .post("/api/v1/users", Some(&token), new_user("NEW@example.com", "user"))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["detail"], "User with this email already exists");
    }

    #[tokio::test]
    async fn test_weak_password_is_rejected() {
        let t = TestApp::new();
        let (_, token) = t.signed_in("admin@example.com", Role::Admin1).await;
        let mut body = new_user("weak@example.com", "user");
        body["password"] = json!("alllowercase");
        body["confirm_password"] = json!("alllowercase");

        let (status, body) = t.post("/api/v1/users", Some(&token), body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0]["field"], "password");
    }

    #[tokio::test]
    async fn test_blank_names_are_rejected() {
        let t = TestApp::new();
        let (_, token) = t.signed_in("admin@example.com", Role::Admin1).await;
        let mut body = new_user("blank@example.com", "user");
        body["first_name"] = json!("   ");

        let (status, body) = t.post("/api/v1/users", Some(&token), body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0]["field"], "first_name");

        let (status, body) = t
            .send(Method::PUT, "/api/v1/users/me", Some(&token), Some(json!({"last_name": " "})))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0]["field"], "last_name");
    }

    #[tokio::test]
    async fn test_admin_listing_is_limited_to_users() {
        let t = TestApp::new();
        let (_, admin_token) = t.signed_in("admin@example.com", Role::Admin1).await;
        let (_, root_token) = t.signed_in("root@example.com", Role::Superadmin).await;
        t.seed("one@example.com", Role::User).await;
        t.seed("two@example.com", Role::User).await;

        let (status, body) = t.get("/api/v1/users?size=10", Some(&admin_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert!(body["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|u| u["role"] == "user"));

        let (_, body) = t.get("/api/v1/users", Some(&root_token)).await;
        assert_eq!(body["total"], 4);

        let (_, body) = t
            .get("/api/v1/users?search=one&role=user", Some(&root_token))
            .await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["email"], "one@example.com");

        let (status, _) = t.get("/api/v1/users?role=emperor", Some(&root_token)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let t = TestApp::new();
        let (_, token) = t.signed_in("admin@example.com", Role::Admin1).await;
        t.seed("one@example.com", Role::User).await;

        let (status, body) = t
            .get("/api/v1/users?page=9223372036854775807", Some(&token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"].as_array().unwrap().len(), 0);
        assert_eq!(body["has_next"], false);
    }

    #[tokio::test]
    async fn test_malformed_id() {
        let t = TestApp::new();
        let (_, token) = t.signed_in("admin@example.com", Role::Admin1).await;
        let (status, body) = t.get("/api/v1/users/42", Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Invalid user ID");

        let uri = format!("/api/v1/users/{}", uuid::Uuid::new_v4());
        let (status, body) = t.get(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "User not found");
    }

    #[tokio::test]
    async fn test_admin_cannot_view_or_manage_peers() {
        let t = TestApp::new();
        let (_, token) = t.signed_in("admin@example.com", Role::Admin1).await;
        let peer = t.seed("peer@example.com", Role::Admin2).await;
        let uri = format!("/api/v1/users/{}", peer.id);

        let (status, body) = t.get(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["detail"], "Not enough permissions to view this user");

        let (status, body) = t
            .send(Method::PUT, &uri, Some(&token), Some(json!({"first_name": "X"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["detail"], "Not enough permissions to update this user");
    }

    #[tokio::test]
    async fn test_update_user_checks_role_assignment() {
        let t = TestApp::new();
        let (_, token) = t.signed_in("admin@example.com", Role::Admin3).await;
        let target = t.seed("target@example.com", Role::User).await;
        let uri = format!("/api/v1/users/{}", target.id);

        let (status, body) = t
            .send(Method::PUT, &uri, Some(&token), Some(json!({"role": "admin3"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["detail"], "Cannot assign role 'admin3'");

        let (status, body) = t
            .send(
                Method::PUT,
                &uri,
                Some(&token),
                Some(json!({"first_name": "Renamed", "is_active": false})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["first_name"], "Renamed");
        assert_eq!(body["is_active"], false);
    }

    #[tokio::test]
    async fn test_delete_and_lock() {
        let t = TestApp::new();
        let (root, token) = t.signed_in("root@example.com", Role::Superadmin).await;
        let target = t.seed("target@example.com", Role::User).await;

        let own = format!("/api/v1/users/{}", root.id);
        let (status, body) = t.send(Method::DELETE, &own, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Cannot delete your own account");

        let (status, body) = t
            .send(Method::POST, &format!("{}/lock", own), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Cannot lock your own account");

        let uri = format!("/api/v1/users/{}", target.id);
        let (status, body) = t
            .send(Method::POST, &format!("{}/lock", uri), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User locked successfully");
        let (_, body) = t.get(&uri, Some(&token)).await;
        assert_eq!(body["is_locked"], true);

        let (status, body) = t
            .send(Method::POST, &format!("{}/unlock", uri), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User unlocked successfully");

        let (status, body) = t.send(Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User deleted successfully");
        let (_, body) = t.get(&uri, Some(&token)).await;
        assert_eq!(body["is_active"], false);
    }

    #[tokio::test]
    async fn test_locked_user_token_stops_working() {
        let t = TestApp::new();
        let (_, root_token) = t.signed_in("root@example.com", Role::Superadmin).await;
        let (target, token) = t.signed_in("target@example.com", Role::User).await;

        let uri = format!("/api/v1/users/{}/lock", target.id);
        t.send(Method::POST, &uri, Some(&root_token), None).await;

        let (status, _) = t.get("/api/v1/users/me", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_profile_self_service() {
        let t = TestApp::new();
        let (_, token) = t.signed_in("ada@example.com", Role::User).await;

        let (status, body) = t.get("/api/v1/users/me", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "ada@example.com");

        let (status, body) = t
            .send(
                Method::PUT,
                "/api/v1/users/me",
                Some(&token),
                Some(json!({"first_name": "Ada", "last_name": "Lovelace"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["full_name"], "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_change_password() {
        let t = TestApp::new();
        let (_, token) = t.signed_in("ada@example.com", Role::User).await;

        let (status, body) = t
            .post(
                "/api/v1/users/me/change-password",
                Some(&token),
                json!({
                    "current_password": "wrong-one",
                    "new_password": "N3w!Secret",
                    "confirm_password": "N3w!Secret",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Current password is incorrect");

        let (status, body) = t
            .post(
                "/api/v1/users/me/change-password",
                Some(&token),
                json!({
                    "current_password": PASSWORD,
                    "new_password": "N3w!Secret",
                    "confirm_password": "N3w!Secret",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Password changed successfully");

        let (status, _) = t.get("/api/v1/users/me", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stats_and_audit_logs() {
        let t = TestApp::new();
        let (admin, token) = t.signed_in("admin@example.com", Role::Admin1).await;
        let target = t.seed("target@example.com", Role::User).await;

        let uri = format!("/api/v1/users/{}/lock", target.id);
        t.send(Method::POST, &uri, Some(&token), None).await;

        let (status, body) = t.get("/api/v1/users/stats", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_users"], 2);
        assert_eq!(body["locked_users"], 1);

        let uri = format!("/api/v1/users/{}/audit-logs", admin.id);
        let (status, body) = t.get(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let actions: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["action"].as_str().unwrap())
            .collect();
        assert!(actions.contains(&"user_locked"));

        let (_, body) = t
            .get(&format!("{}?action=user_locked", uri), Some(&token))
            .await;
        assert_eq!(body["total"], 1);
    }
}
