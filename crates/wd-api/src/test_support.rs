//! Router harness over in-memory stores

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use wd_core::config::AppConfig;
use wd_core::Role;
use wd_db::Stores;
use wd_models::{CreateUser, User};
use wd_services::{MemoryNotifier, RequestContext, Services};

use crate::extractors::AppState;
use crate::routes::router;

pub const PASSWORD: &str = "Str0ng!Pass";

pub struct TestApp {
    pub app: Router,
    pub services: Services,
    pub notifier: Arc<MemoryNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        let notifier = Arc::new(MemoryNotifier::default());
        let services = Services::new(AppConfig::default(), Stores::memory(), notifier.clone())
            .expect("services build from default config");
        let app = router().with_state(AppState::new(services.clone()));
        Self {
            app,
            services,
            notifier,
        }
    }

    pub async fn seed(&self, email: &str, role: Role) -> User {
        let input = CreateUser {
            email: email.to_string(),
            first_name: "Test".into(),
            last_name: "User".into(),
            role,
            is_active: true,
            password: PASSWORD.into(),
            confirm_password: PASSWORD.into(),
        };
        self.services
            .users
            .create_user(input, None, &RequestContext::system())
            .await
            .expect("seed user")
    }

    /// Seed an account and return it with a fresh access token
    pub async fn signed_in(&self, email: &str, role: Role) -> (User, String) {
        let user = self.seed(email, role).await;
        let (_, tokens) = self
            .services
            .auth
            .login(email, PASSWORD, false, &RequestContext::system())
            .await
            .expect("login");
        (user, tokens.access_token)
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        match body {
            Some(body) => {
                self.send_raw(method, uri, token, Some("application/json"), &body.to_string())
                    .await
            }
            None => self.send_raw(method, uri, token, None, "").await,
        }
    }

    /// Send `body` as-is, with an optional content type
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }
}
