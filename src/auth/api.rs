//! Authentication API Endpoints
//! Mission: Provide registration, login and identity endpoints

use crate::auth::{
    jwt::JwtHandler,
    models::{
        AuthResponse, Identity, LoginRequest, NewUser, RegisterRequest, TokenSubject, User,
        UserResponse, UserRole,
    },
    password::{PasswordError, PasswordHasher},
    user_store::{CredentialStore, StoreError},
};
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<dyn CredentialStore>,
    pub jwt_handler: Arc<JwtHandler>,
    pub hasher: Arc<PasswordHasher>,
}

impl AuthState {
    pub fn new(
        user_store: Arc<dyn CredentialStore>,
        jwt_handler: Arc<JwtHandler>,
        hasher: Arc<PasswordHasher>,
    ) -> Self {
        Self {
            user_store,
            jwt_handler,
            hasher,
        }
    }

    /// bcrypt is CPU-bound; keep it off the async workers
    pub async fn hash_password(&self, password: String) -> Result<String, AuthApiError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                error!("Password hashing task failed: {}", e);
                AuthApiError::InternalError
            })?
            .map_err(AuthApiError::from)
    }

    /// Verify against `hash`, or against the dummy hash when no user matched
    pub async fn verify_password(&self, password: String, hash: Option<String>) -> bool {
        let hasher = self.hasher.clone();
        let result = tokio::task::spawn_blocking(move || match hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => {
                hasher.verify_dummy(&password);
                false
            }
        })
        .await;

        result.unwrap_or_else(|e| {
            error!("Password verification task failed: {}", e);
            false
        })
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AuthApiError> {
        self.jwt_handler
            .issue(&TokenSubject::from_user(user))
            .map_err(|e| {
                error!("Failed to issue token for {}: {}", user.id, e);
                AuthApiError::InternalError
            })
    }
}

/// JSON body extractor whose rejection is an [`AuthApiError`].
///
/// Missing fields, wrong types, bad syntax and a missing content type all
/// become 400 `{"message": "Invalid request body"}`.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AuthApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                Err(AuthApiError::InvalidBody)
            }
        }
    }
}

/// Check the fields every account must carry
pub fn validate_account_fields(email: &str, full_name: &str) -> Result<(), AuthApiError> {
    let valid_email = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid_email {
        return Err(AuthApiError::InvalidEmail);
    }
    if full_name.trim().is_empty() {
        return Err(AuthApiError::MissingFullName);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthApiError::WeakPassword);
    }
    Ok(())
}

pub fn parse_role(role: &str) -> Result<UserRole, AuthApiError> {
    role.parse::<UserRole>().map_err(|_| AuthApiError::InvalidRole)
}

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AuthState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthApiError> {
    validate_account_fields(&payload.email, &payload.full_name)?;
    validate_password(&payload.password)?;

    let role = match payload.role.as_deref() {
        None => UserRole::Student,
        Some(role) => parse_role(role)?,
    };
    if role == UserRole::Admin {
        warn!("Rejected self-registration as admin: {}", payload.email);
        return Err(AuthApiError::RoleNotAllowed);
    }

    if state
        .user_store
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(AuthApiError::UserAlreadyExists);
    }

    let password_hash = state.hash_password(payload.password).await?;

    // The store's unique constraint still decides a concurrent race.
    let user = state
        .user_store
        .insert_user(NewUser {
            email: payload.email,
            password_hash,
            full_name: payload.full_name.trim().to_string(),
            role,
        })
        .await?;

    let token = state.issue_token(&user)?;

    info!("✅ Registered user: {} ({})", user.email, user.role);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully",
            user: UserResponse::from_user(&user),
            token,
        }),
    ))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthApiError> {
    info!("🔐 Login attempt: {}", payload.email);

    let user = state.user_store.find_user_by_email(&payload.email).await?;

    let valid = state
        .verify_password(
            payload.password,
            user.as_ref().map(|u| u.password_hash.clone()),
        )
        .await;

    let user = match user {
        Some(user) if valid => user,
        _ => {
            warn!("❌ Failed login attempt: {}", payload.email);
            return Err(AuthApiError::InvalidCredentials);
        }
    };

    if !user.is_active {
        warn!("Login refused for deactivated account: {}", user.email);
        return Err(AuthApiError::AccountDisabled);
    }

    let token = state.issue_token(&user)?;

    info!("✅ Login successful: {} ({})", user.email, user.role);

    Ok(Json(AuthResponse {
        message: "Login successful",
        user: UserResponse::from_user(&user),
        token,
    }))
}

/// Current identity - GET /api/auth/me
/// Built from the verified token; no store lookup.
pub async fn me(identity: Identity) -> Json<Value> {
    Json(json!({ "user": identity }))
}

/// Auth API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthApiError {
    InvalidCredentials,
    AccountDisabled,
    InvalidBody,
    InvalidEmail,
    MissingFullName,
    WeakPassword,
    InvalidPassword(&'static str),
    InvalidRole,
    RoleNotAllowed,
    InvalidUserId,
    CannotDeleteSelf,
    UserNotFound,
    UserAlreadyExists,
    InternalError,
}

impl From<StoreError> for AuthApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => AuthApiError::UserAlreadyExists,
            StoreError::NotFound => AuthApiError::UserNotFound,
            other => {
                error!("Credential store failure: {}", other);
                AuthApiError::InternalError
            }
        }
    }
}

impl From<PasswordError> for AuthApiError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::Validation(reason) => AuthApiError::InvalidPassword(reason),
            other => {
                error!("Password hashing failure: {}", other);
                AuthApiError::InternalError
            }
        }
    }
}

impl AuthApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthApiError::AccountDisabled => StatusCode::FORBIDDEN,
            AuthApiError::InvalidBody
            | AuthApiError::InvalidEmail
            | AuthApiError::MissingFullName
            | AuthApiError::WeakPassword
            | AuthApiError::InvalidPassword(_)
            | AuthApiError::InvalidRole
            | AuthApiError::RoleNotAllowed
            | AuthApiError::InvalidUserId
            | AuthApiError::CannotDeleteSelf => StatusCode::BAD_REQUEST,
            AuthApiError::UserNotFound => StatusCode::NOT_FOUND,
            AuthApiError::UserAlreadyExists => StatusCode::CONFLICT,
            AuthApiError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthApiError::InvalidCredentials => "Invalid credentials",
            AuthApiError::AccountDisabled => "Account is deactivated",
            AuthApiError::InvalidBody => "Invalid request body",
            AuthApiError::InvalidEmail => "Invalid email address",
            AuthApiError::MissingFullName => "Full name is required",
            AuthApiError::WeakPassword => "Password must be at least 6 characters",
            AuthApiError::InvalidPassword(reason) => *reason,
            AuthApiError::InvalidRole => "Invalid role",
            AuthApiError::RoleNotAllowed => "Admin accounts cannot be self-registered",
            AuthApiError::InvalidUserId => "Invalid user ID format",
            AuthApiError::CannotDeleteSelf => "Cannot delete your own account",
            AuthApiError::UserNotFound => "User not found",
            AuthApiError::UserAlreadyExists => "User already exists",
            AuthApiError::InternalError => "Server error",
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "message": self.message() }))).into_response()
    }
}
