//! # Authentication
//!
//! Turns an `Authorization` header into a [`Principal`] and gates principals
//! on activation and permission codes.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Authorization header                                                  │
//! │       │                                                                 │
//! │       ├── absent ─────────────────────────► Principal::Anonymous        │
//! │       ├── "Bearer <token>"                                             │
//! │       │       │                                                         │
//! │       │       ▼                                                         │
//! │       │   tokens.resolve(Authentication, token)                        │
//! │       │       ├── user ───────────────────► Principal::Authenticated    │
//! │       │       └── not found / malformed ──► InvalidAuthenticationToken  │
//! │       └── anything else ──────────────────► InvalidAuthenticationToken  │
//! │                                                                         │
//! │  require_activated(principal)   Anonymous ──► AuthenticationRequired    │
//! │                                 inactive  ──► InactiveAccount           │
//! │  permissions_for(principal)     one store read per request              │
//! │  require_permission(p, set, c)  in memory, missing ──► PermissionDenied │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The HTTP layer should answer `InvalidAuthenticationToken` with a
//! `WWW-Authenticate: Bearer` header.

use thiserror::Error;
use tracing::debug;

use cashcow_core::{Permissions, Principal, TokenScope, User};

use crate::error::{DbError, ErrorBody, ErrorCode};
use crate::pool::Database;

/// Authentication and authorization failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    #[error("missing permission {code}")]
    PermissionDenied { code: String },

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] DbError),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::InvalidAuthenticationToken => {
                ErrorBody::new(ErrorCode::InvalidAuthenticationToken, err.to_string())
            }
            AuthError::AuthenticationRequired => {
                ErrorBody::new(ErrorCode::AuthenticationRequired, err.to_string())
            }
            AuthError::InactiveAccount => {
                ErrorBody::new(ErrorCode::InactiveAccount, err.to_string())
            }
            // The code is for logs; the client learns only that access was refused.
            AuthError::PermissionDenied { .. } => ErrorBody::new(
                ErrorCode::PermissionDenied,
                "your user account doesn't have the necessary permissions to access this resource",
            ),
            AuthError::InvalidCredentials => {
                ErrorBody::new(ErrorCode::InvalidCredentials, err.to_string())
            }
            AuthError::Store(e) => ErrorBody::from(e),
        }
    }
}

/// Extracts the token from an `Authorization` header value.
///
/// ## Returns
/// * `Ok(None)` - no header
/// * `Ok(Some(token))` - `Bearer <token>`
/// * `Err(InvalidAuthenticationToken)` - any other shape
pub fn extract_bearer_token(header: Option<&str>) -> AuthResult<Option<&str>> {
    let Some(value) = header else {
        return Ok(None);
    };

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(Some(token)),
        _ => Err(AuthError::InvalidAuthenticationToken),
    }
}

/// Resolves principals and checks what they may do.
#[derive(Debug, Clone)]
pub struct Authenticator {
    db: Database,
}

impl Authenticator {
    pub fn new(db: Database) -> Self {
        Authenticator { db }
    }

    /// Resolves the principal for one request.
    ///
    /// Soft-deleted users are treated like an unknown token.
    pub async fn authenticate(&self, header: Option<&str>) -> AuthResult<Principal> {
        let Some(token) = extract_bearer_token(header)? else {
            return Ok(Principal::Anonymous);
        };

        let user = match self
            .db
            .tokens()
            .resolve(TokenScope::Authentication, token)
            .await
        {
            Ok(user) => user,
            Err(DbError::NotFound { .. } | DbError::Validation(_)) => {
                return Err(AuthError::InvalidAuthenticationToken)
            }
            Err(e) => return Err(e.into()),
        };

        if user.is_deleted {
            return Err(AuthError::InvalidAuthenticationToken);
        }

        debug!(user_id = user.id, "Request authenticated");
        Ok(Principal::Authenticated(user))
    }

    /// The user behind `principal`, if authenticated and activated.
    pub fn require_activated<'p>(&self, principal: &'p Principal) -> AuthResult<&'p User> {
        let user = principal.user().ok_or(AuthError::AuthenticationRequired)?;
        if !user.is_activated {
            return Err(AuthError::InactiveAccount);
        }
        Ok(user)
    }

    /// Loads the permission codes held by `principal`. Anonymous holds none.
    pub async fn permissions_for(&self, principal: &Principal) -> AuthResult<Permissions> {
        match principal.user() {
            Some(user) => Ok(self.db.permissions().list_codes(user.id).await?),
            None => Ok(Permissions::new()),
        }
    }

    /// Like [`require_activated`](Self::require_activated), plus `code`
    /// must be in `permissions`, as loaded by
    /// [`permissions_for`](Self::permissions_for).
    pub fn require_permission<'p>(
        &self,
        principal: &'p Principal,
        permissions: &Permissions,
        code: &str,
    ) -> AuthResult<&'p User> {
        let user = self.require_activated(principal)?;

        if !permissions.includes(code) {
            debug!(user_id = user.id, code, "Permission denied");
            return Err(AuthError::PermissionDenied {
                code: code.to_string(),
            });
        }
        Ok(user)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{create_user, test_db};
    use cashcow_core::NewPermission;
    use chrono::Duration;

    async fn bearer_for(db: &Database, user_id: i64) -> String {
        let token = db
            .tokens()
            .issue(user_id, Duration::hours(1), TokenScope::Authentication)
            .await
            .unwrap();
        format!("Bearer {}", token.plaintext)
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(None).unwrap(), None);
        assert_eq!(extract_bearer_token(Some("Bearer abc")).unwrap(), Some("abc"));
        for bad in ["", "Bearer", "Basic abc", "bearer abc", "Bearer a b"] {
            assert!(matches!(
                extract_bearer_token(Some(bad)),
                Err(AuthError::InvalidAuthenticationToken)
            ));
        }
    }

    #[tokio::test]
    async fn test_no_header_is_anonymous() {
        let auth = Authenticator::new(test_db().await);
        let principal = auth.authenticate(None).await.unwrap();
        assert!(principal.is_anonymous());
        assert!(matches!(
            auth.require_activated(&principal),
            Err(AuthError::AuthenticationRequired)
        ));
    }

    #[tokio::test]
    async fn test_bearer_resolves_user() {
        let db = test_db().await;
        let user = create_user(&db, 1).await;
        let header = bearer_for(&db, user.id).await;

        let auth = Authenticator::new(db);
        let principal = auth.authenticate(Some(&header)).await.unwrap();
        assert_eq!(principal.user().map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_bad_tokens_rejected() {
        let db = test_db().await;
        let user = create_user(&db, 1).await;
        let activation = db
            .tokens()
            .issue(user.id, Duration::hours(1), TokenScope::Activation)
            .await
            .unwrap();
        let auth = Authenticator::new(db);

        for header in [
            "Bearer short".to_string(),
            "Bearer AAAAAAAAAAAAAAAAAAAAAA".to_string(),
            format!("Bearer {}", activation.plaintext),
        ] {
            assert!(matches!(
                auth.authenticate(Some(&header)).await,
                Err(AuthError::InvalidAuthenticationToken)
            ));
        }
    }

    #[tokio::test]
    async fn test_deleted_user_cannot_authenticate() {
        let db = test_db().await;
        let mut user = create_user(&db, 1).await;
        let header = bearer_for(&db, user.id).await;
        db.users().soft_delete(&mut user).await.unwrap();

        let auth = Authenticator::new(db);
        assert!(matches!(
            auth.authenticate(Some(&header)).await,
            Err(AuthError::InvalidAuthenticationToken)
        ));
    }

    #[tokio::test]
    async fn test_activation_and_permission_gates() {
        let db = test_db().await;
        let mut user = create_user(&db, 1).await;
        db.permissions()
            .create(&NewPermission::new("cattle:write", ""))
            .await
            .unwrap();
        let header = bearer_for(&db, user.id).await;
        let auth = Authenticator::new(db.clone());

        let principal = auth.authenticate(Some(&header)).await.unwrap();
        let none = auth.permissions_for(&principal).await.unwrap();
        assert!(matches!(
            auth.require_permission(&principal, &none, "cattle:write"),
            Err(AuthError::InactiveAccount)
        ));

        user.is_activated = true;
        db.users().update(&mut user).await.unwrap();
        let principal = auth.authenticate(Some(&header)).await.unwrap();
        match auth.require_permission(&principal, &none, "cattle:write") {
            Err(AuthError::PermissionDenied { code }) => assert_eq!(code, "cattle:write"),
            other => panic!("expected permission denied, got {other:?}"),
        }

        db.permissions().grant(user.id, &["cattle:write"]).await.unwrap();
        let granted = auth.permissions_for(&principal).await.unwrap();
        let allowed = auth
            .require_permission(&principal, &granted, "cattle:write")
            .unwrap();
        assert_eq!(allowed.id, user.id);
    }

    #[tokio::test]
    async fn test_one_permission_load_serves_many_checks() {
        let db = test_db().await;
        let mut user = create_user(&db, 1).await;
        user.is_activated = true;
        db.users().update(&mut user).await.unwrap();
        for code in ["cattle:read", "cattle:write"] {
            db.permissions()
                .create(&NewPermission::new(code, ""))
                .await
                .unwrap();
        }
        db.permissions().grant(user.id, &["cattle:read"]).await.unwrap();
        let header = bearer_for(&db, user.id).await;
        let auth = Authenticator::new(db.clone());

        let principal = auth.authenticate(Some(&header)).await.unwrap();
        let permissions = auth.permissions_for(&principal).await.unwrap();

        // Later grants are not visible to an already loaded set.
        db.permissions().grant(user.id, &["cattle:write"]).await.unwrap();

        assert!(auth.require_permission(&principal, &permissions, "cattle:read").is_ok());
        assert!(matches!(
            auth.require_permission(&principal, &permissions, "cattle:write"),
            Err(AuthError::PermissionDenied { .. })
        ));
        assert!(auth.require_permission(&principal, &permissions, "cattle:read").is_ok());
    }

    #[tokio::test]
    async fn test_anonymous_holds_no_permissions() {
        let auth = Authenticator::new(test_db().await);
        let permissions = auth.permissions_for(&Principal::Anonymous).await.unwrap();
        assert!(!permissions.includes("cattle:read"));
        assert!(matches!(
            auth.require_permission(&Principal::Anonymous, &permissions, "cattle:read"),
            Err(AuthError::AuthenticationRequired)
        ));
    }

    #[test]
    fn test_error_bodies() {
        assert_eq!(ErrorBody::from(&AuthError::InvalidAuthenticationToken).status(), 401);
        assert_eq!(ErrorBody::from(&AuthError::InvalidCredentials).status(), 401);
        assert_eq!(ErrorBody::from(&AuthError::InactiveAccount).status(), 403);

        let body = ErrorBody::from(&AuthError::PermissionDenied {
            code: "users:write".into(),
        });
        assert_eq!(body.status(), 403);
        assert!(!body.message.contains("users:write"));
    }
}
