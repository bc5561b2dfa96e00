//! Admin user-management endpoints, mounted behind the admin role guard

use crate::auth::{
    api::{
        parse_role, validate_account_fields, validate_password, ApiJson, AuthApiError, AuthState,
    },
    models::{
        CreateUserRequest, Identity, NewUser, UpdateUserRequest, User, UserDetails, UserUpdate,
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<UserDetails>,
    pub count: usize,
}

impl UsersResponse {
    fn from_users(users: &[User]) -> Self {
        Self {
            success: true,
            users: users.iter().map(UserDetails::from_user).collect(),
            count: users.len(),
        }
    }
}

fn parse_user_id(id: &str) -> Result<Uuid, AuthApiError> {
    Uuid::parse_str(id).map_err(|_| AuthApiError::InvalidUserId)
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AuthState>,
) -> Result<Json<UsersResponse>, AuthApiError> {
    let users = state.user_store.list_users(None).await?;
    Ok(Json(UsersResponse::from_users(&users)))
}

/// GET /api/users/role/:role
pub async fn list_users_by_role(
    State(state): State<AuthState>,
    Path(role): Path<String>,
) -> Result<Json<UsersResponse>, AuthApiError> {
    let role = parse_role(&role)?;
    let users = state.user_store.list_users(Some(role)).await?;
    Ok(Json(UsersResponse::from_users(&users)))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AuthApiError> {
    let id = parse_user_id(&user_id)?;
    let user = state
        .user_store
        .find_user_by_id(id)
        .await?
        .ok_or(AuthApiError::UserNotFound)?;

    Ok(Json(json!({
        "success": true,
        "user": UserDetails::from_user(&user),
    })))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AuthState>,
    admin: Identity,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), AuthApiError> {
    let role = parse_role(&payload.role)?;
    validate_account_fields(&payload.email, &payload.full_name)?;
    validate_password(&payload.password)?;

    if state
        .user_store
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(AuthApiError::UserAlreadyExists);
    }

    let password_hash = state.hash_password(payload.password).await?;
    let user = state
        .user_store
        .insert_user(NewUser {
            email: payload.email,
            password_hash,
            full_name: payload.full_name.trim().to_string(),
            role,
        })
        .await?;

    info!(
        "✅ User created by {}: {} ({})",
        admin.email, user.email, user.role
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "user": UserDetails::from_user(&user),
        })),
    ))
}

/// PUT /api/users/:id
///
/// Role changes apply to tokens issued afterwards; outstanding tokens keep
/// the role they were issued with until they expire.
pub async fn update_user(
    State(state): State<AuthState>,
    admin: Identity,
    Path(user_id): Path<String>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<Value>, AuthApiError> {
    let id = parse_user_id(&user_id)?;
    let role = parse_role(&payload.role)?;
    validate_account_fields(&payload.email, &payload.full_name)?;

    let user = state
        .user_store
        .update_user(
            id,
            UserUpdate {
                email: payload.email,
                full_name: payload.full_name.trim().to_string(),
                role,
                is_active: payload.is_active,
            },
        )
        .await?;

    info!(
        "✏️  User updated by {}: {} ({}, active={})",
        admin.email, user.email, user.role, user.is_active
    );

    Ok(Json(json!({
        "success": true,
        "message": "User updated successfully",
        "user": UserDetails::from_user(&user),
    })))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AuthState>,
    admin: Identity,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AuthApiError> {
    let id = parse_user_id(&user_id)?;

    if id == admin.id {
        return Err(AuthApiError::CannotDeleteSelf);
    }

    state.user_store.delete_user(id).await?;

    info!("🗑️  User deleted by {}: {}", admin.email, id);

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::UserRole;

    #[test]
    fn test_users_response_counts_and_hides_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            full_name: "Ada".to_string(),
            role: UserRole::Student,
            is_active: true,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };

        let response = UsersResponse::from_users(&[user.clone(), user]);
        assert_eq!(response.count, 2);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""is_active":true"#));
        assert!(!json.contains("$2b$04$hash"));
    }

    #[test]
    fn test_parse_user_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()), Ok(id));
        assert_eq!(parse_user_id("42"), Err(AuthApiError::InvalidUserId));
    }
}
