//! Role Authorization
//! Mission: Gate routes on the authenticated role, failing closed

use crate::auth::{
    middleware::{extract_identity, AuthError},
    models::{Identity, UserRole},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Set of roles a route accepts.
///
/// An empty set admits nobody.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    allowed: Arc<HashSet<UserRole>>,
}

impl RoleGuard {
    pub fn new(roles: impl IntoIterator<Item = UserRole>) -> Self {
        Self {
            allowed: Arc::new(roles.into_iter().collect()),
        }
    }

    pub fn admin_only() -> Self {
        Self::new([UserRole::Admin])
    }

    pub fn allows(&self, role: UserRole) -> bool {
        self.allowed.contains(&role)
    }

    /// Decide for a request's identity. Missing identity is 401, wrong role 403.
    pub fn check(&self, identity: Option<&Identity>) -> Result<(), AuthError> {
        let identity = identity.ok_or(AuthError::Unauthenticated)?;
        if self.allows(identity.role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Role middleware; mount with `from_fn_with_state(RoleGuard, authorize)` inside `auth_middleware`
pub async fn authorize(
    State(guard): State<RoleGuard>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Err(e) = guard.check(extract_identity(&req)) {
        match e {
            AuthError::Forbidden => warn!(
                "Forbidden: {} on {} {}",
                extract_identity(&req)
                    .map(|i| i.role.as_str())
                    .unwrap_or("unknown"),
                req.method(),
                req.uri().path()
            ),
            _ => warn!(
                "Role check on {} reached without authentication; denying",
                req.uri().path()
            ),
        }
        return Err(e);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity(role: UserRole) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_admin_guard() {
        let guard = RoleGuard::admin_only();

        assert_eq!(guard.check(Some(&identity(UserRole::Admin))), Ok(()));
        assert_eq!(
            guard.check(Some(&identity(UserRole::Student))),
            Err(AuthError::Forbidden)
        );
        assert_eq!(
            guard.check(Some(&identity(UserRole::Examiner))),
            Err(AuthError::Forbidden)
        );
    }

    #[test]
    fn test_multi_role_guard() {
        let guard = RoleGuard::new([UserRole::Admin, UserRole::Examiner]);

        assert!(guard.check(Some(&identity(UserRole::Examiner))).is_ok());
        assert!(guard.check(Some(&identity(UserRole::Admin))).is_ok());
        assert_eq!(
            guard.check(Some(&identity(UserRole::Student))),
            Err(AuthError::Forbidden)
        );
    }

    #[test]
    fn test_missing_identity_fails_closed() {
        let guard = RoleGuard::new([UserRole::Admin, UserRole::Student, UserRole::Examiner]);
        assert_eq!(guard.check(None), Err(AuthError::Unauthenticated));
    }

    #[test]
    fn test_empty_guard_denies_everyone() {
        let guard = RoleGuard::new([]);
        for role in [UserRole::Admin, UserRole::Student, UserRole::Examiner] {
            assert_eq!(
                guard.check(Some(&identity(role))),
                Err(AuthError::Forbidden)
            );
        }
    }
}
