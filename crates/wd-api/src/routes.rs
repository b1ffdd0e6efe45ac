//! API routes

use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::extractors::AppState;
use crate::handlers::{admin, auth, users};

pub const API_PREFIX: &str = "/api/v1";

/// Create the complete API router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .nest(API_PREFIX, api_v1_router())
}

fn api_v1_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_router())
        .nest("/users", users_router())
        .nest("/admin", admin_router())
}

fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/password-reset", post(auth::request_password_reset))
        .route("/password-reset/confirm", post(auth::confirm_password_reset))
        .route("/verify-email", post(auth::verify_email))
        .route("/verify-token", post(auth::verify_token))
        .route("/sessions", get(auth::list_sessions))
        .route("/sessions/:id", delete(auth::revoke_session))
}

fn users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/stats", get(users::user_stats))
        .route("/me", get(users::get_me).put(users::update_me))
        .route("/me/change-password", post(users::change_my_password))
        .route(
            "/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/:id/lock", post(users::lock_user))
        .route("/:id/unlock", post(users::unlock_user))
        .route("/:id/audit-logs", get(users::user_audit_logs))
}

fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admins", get(admin::list_admins).post(admin::create_admin))
        .route(
            "/admins/:id",
            get(admin::get_admin)
                .put(admin::update_admin)
                .delete(admin::delete_admin),
        )
        .route("/admins/:id/lock", post(admin::lock_admin))
        .route("/admins/:id/unlock", post(admin::unlock_admin))
        .route("/system/stats", get(admin::system_stats))
        .route("/audit-logs", get(admin::audit_logs))
        .route("/roles", get(admin::roles))
}

#[derive(Serialize)]
struct ServiceInfo {
    name: String,
    version: String,
    description: String,
    environment: &'static str,
    api: &'static str,
}

async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let app = &state.services.config.app;
    Json(ServiceInfo {
        name: app.name.clone(),
        version: app.version.clone(),
        description: app.description.clone(),
        environment: app.environment.as_str(),
        api: API_PREFIX,
    })
}
