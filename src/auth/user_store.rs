//! User Storage
//! Mission: Credential store behind a narrow trait, with SQLite and in-memory backends

use crate::auth::models::{NewUser, User, UserRole, UserUpdate};
use crate::auth::password::PasswordHasher;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{ffi, params, types::Type, Connection, ErrorCode, OptionalExtension, Row};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    Conflict,
    #[error("user not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("store worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Single-row operations the auth layer needs from a user store.
///
/// Implementations must enforce email uniqueness themselves and report it as
/// [`StoreError::Conflict`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, StoreError>;

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;

    /// All users, newest first, optionally restricted to one role
    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, StoreError>;
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('admin', 'student', 'examiner')),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
"#;

const USER_COLUMNS: &str =
    "id, email, password_hash, full_name, role, is_active, created_at, updated_at";

/// User storage with SQLite backend.
///
/// Every query runs on the blocking pool; the connection lock is never held
/// across an await.
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    /// Open (or create) the database at `db_path` and initialize the schema
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open user database at {}", db_path))?;
        Self::with_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize user schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool
    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || op(&*conn.lock())).await?
    }

    fn query_one(conn: &Connection, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
        let user = conn
            .query_row(&sql, params![value], row_to_user)
            .optional()?;
        Ok(user)
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(4)?;
    Ok(User {
        id: Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        full_name: row.get(3)?,
        role: role
            .parse::<UserRole>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_unique_violation(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::Conflict
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl CredentialStore for SqliteUserStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_string();
        self.run(move |conn| Self::query_one(conn, "email", &email))
            .await
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.run(move |conn| Self::query_one(conn, "id", &id.to_string()))
            .await
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let now = timestamp();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            full_name: new_user.full_name,
            role: new_user.role,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO users (id, email, password_hash, full_name, role, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.full_name,
                    user.role.as_str(),
                    user.is_active,
                    user.created_at,
                    user.updated_at,
                ],
            )
            .map_err(map_unique_violation)?;
            Ok(user)
        })
        .await
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, StoreError> {
        self.run(move |conn| {
            let rows = conn
                .execute(
                    "UPDATE users SET email = ?1, full_name = ?2, role = ?3, is_active = ?4, updated_at = ?5
                     WHERE id = ?6",
                    params![
                        update.email,
                        update.full_name,
                        update.role.as_str(),
                        update.is_active,
                        timestamp(),
                        id.to_string(),
                    ],
                )
                .map_err(map_unique_violation)?;

            if rows == 0 {
                return Err(StoreError::NotFound);
            }

            Self::query_one(conn, "id", &id.to_string())?.ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        self.run(move |conn| {
            let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
            if rows == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, StoreError> {
        self.run(move |conn| {
            let users = match role {
                Some(role) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {USER_COLUMNS} FROM users WHERE role = ?1
                         ORDER BY created_at DESC, rowid DESC"
                    ))?;
                    let rows = stmt.query_map(params![role.as_str()], row_to_user)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, rowid DESC"
                    ))?;
                    let rows = stmt.query_map([], row_to_user)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            Ok(users)
        })
        .await
    }
}

/// In-memory store with the same semantics as [`SqliteUserStore`]
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>, // insertion order
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryUserStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write();
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict);
        }

        let now = timestamp();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            full_name: new_user.full_name,
            role: new_user.role,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, StoreError> {
        let mut users = self.users.write();
        if users.iter().any(|u| u.id != id && u.email == update.email) {
            return Err(StoreError::Conflict);
        }

        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        user.email = update.email;
        user.full_name = update.full_name;
        user.role = update.role;
        user.is_active = update.is_active;
        user.updated_at = timestamp();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut users = self.users.write();
        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, StoreError> {
        Ok(self
            .users
            .read()
            .iter()
            .rev()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect())
    }
}

/// Create the bootstrap admin account unless that email is already registered.
///
/// Returns `true` when a new account was created.
pub async fn ensure_admin(
    store: &dyn CredentialStore,
    hasher: &PasswordHasher,
    email: &str,
    password: &str,
    full_name: &str,
) -> Result<bool> {
    if let Some(existing) = store.find_user_by_email(email).await? {
        if existing.role != UserRole::Admin {
            warn!(
                "Bootstrap admin {} already exists with role {}; leaving it unchanged",
                email, existing.role
            );
        }
        return Ok(false);
    }

    let password_hash = hasher
        .hash(password)
        .context("Invalid bootstrap admin password")?;
    store
        .insert_user(NewUser {
            email: email.to_string(),
            password_hash,
            full_name: full_name.to_string(),
            role: UserRole::Admin,
        })
        .await
        .context("Failed to insert bootstrap admin")?;

    info!("🔐 Bootstrap admin created: {}", email);
    Ok(true)
}
