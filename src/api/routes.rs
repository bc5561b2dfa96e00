use axum::{
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::{
    api::users,
    auth::{api as auth_api, auth_middleware, authorize, AuthState, RoleGuard},
    middleware::{logging::HEALTH_PATH, request_logging},
};

/// Create the API router.
///
/// Layering, outermost first: CORS, request logging, then for protected
/// routes the bearer-token check and, for `/api/users`, the admin role guard.
pub fn create_router(state: AuthState) -> Router {
    let public_routes = Router::new()
        .route(HEALTH_PATH, get(health_check))
        .route("/api/auth/register", post(auth_api::register))
        .route("/api/auth/login", post(auth_api::login));

    let admin_routes = Router::new()
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/users/role/:role", get(users::list_users_by_role))
        .route(
            "/api/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(
            RoleGuard::admin_only(),
            authorize,
        ));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth_api::me))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.jwt_handler.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "Server is running",
    }))
}
