//! Authentication Middleware
//! Mission: Protect API endpoints with bearer-token validation

use crate::auth::{
    jwt::{JwtHandler, TokenError},
    models::Identity,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Auth middleware that validates bearer tokens.
///
/// On success the decoded [`Identity`] is stored in the request extensions;
/// any failure short-circuits with 401 before the inner handler runs.
pub async fn auth_middleware(
    State(jwt_handler): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&req)?;

    let claims = jwt_handler.verify(&token).map_err(|e| {
        debug!("Rejected bearer token on {}: {}", req.uri().path(), e);
        match e {
            TokenError::Expired => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        }
    })?;

    req.extensions_mut().insert(Identity::from(claims));

    Ok(next.run(req).await)
}

/// Pull the token out of `Authorization: Bearer <token>`
fn bearer_token(req: &Request) -> Result<String, AuthError> {
    if !req.headers().contains_key(AUTHORIZATION) {
        return Err(AuthError::MissingToken);
    }

    let Authorization(bearer) = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AuthError::InvalidFormat)?;

    let token = bearer.token().trim();
    if token.is_empty() {
        return Err(AuthError::InvalidFormat);
    }
    Ok(token.to_string())
}

/// Extract the identity from a request (use after auth middleware)
pub fn extract_identity(req: &Request) -> Option<&Identity> {
    req.extensions().get::<Identity>()
}

/// Handlers can take `Identity` directly; a route without the middleware fails closed.
#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Auth error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
    ExpiredToken,
    /// No identity on the request: authentication never ran
    Unauthenticated,
    /// Authenticated, but the role is not allowed here
    Forbidden,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Missing authorization token",
            AuthError::InvalidFormat => "Invalid authorization format. Use: Bearer {token}",
            AuthError::InvalidToken => "Invalid token",
            AuthError::ExpiredToken => "Token expired",
            AuthError::Unauthenticated => "Authentication required",
            AuthError::Forbidden => "Access denied. Insufficient permissions",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "message": self.message() }))).into_response()
    }
}
