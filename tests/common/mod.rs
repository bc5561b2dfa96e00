//! Shared helpers for the HTTP integration tests.
//!
//! Each test builds its own router over a fresh in-memory store, with the
//! lowest bcrypt cost so hashing stays fast.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use examportal_backend::{
    auth::{
        models::{NewUser, User, UserRole},
        AuthState, CredentialStore, JwtHandler, MemoryUserStore, PasswordHasher,
    },
    create_router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret";
pub const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

pub struct TestApp {
    pub router: Router,
    pub state: AuthState,
    pub store: Arc<MemoryUserStore>,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(MemoryUserStore::new());
    let state = AuthState::new(
        store.clone(),
        Arc::new(JwtHandler::new(SECRET, WEEK).unwrap()),
        Arc::new(PasswordHasher::new(4).unwrap()),
    );
    TestApp {
        router: create_router(state.clone()),
        state,
        store,
    }
}

impl TestApp {
    /// Insert a user directly into the store
    pub async fn seed_user(&self, email: &str, password: &str, role: UserRole) -> User {
        let password_hash = self.state.hasher.hash(password).unwrap();
        self.store
            .insert_user(NewUser {
                email: email.to_string(),
                password_hash,
                full_name: format!("{} user", role),
                role,
            })
            .await
            .unwrap()
    }

    /// Seed a user and return a token issued for them
    pub async fn token_for(&self, email: &str, role: UserRole) -> (User, String) {
        let user = self.seed_user(email, "password1", role).await;
        let token = self.state.issue_token(&user).unwrap();
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        send(&self.router, request).await
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

pub fn request(method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Request with a raw JSON-typed body, for payloads `serde_json::Value` can't express
pub fn raw_json(method: Method, uri: &str, body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, None, token)
}

pub fn post(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    request(Method::POST, uri, Some(body), token)
}

pub fn put(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    request(Method::PUT, uri, Some(body), token)
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    request(Method::DELETE, uri, None, token)
}
