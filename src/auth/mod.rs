//! Authentication Module
//! Mission: Credential verification, token issuance and role-gated access

pub mod api;
pub mod authorize;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod user_store;

pub use api::AuthState;
pub use authorize::{authorize, RoleGuard};
pub use jwt::JwtHandler;
pub use middleware::auth_middleware;
pub use password::PasswordHasher;
pub use user_store::{CredentialStore, MemoryUserStore, SqliteUserStore};
