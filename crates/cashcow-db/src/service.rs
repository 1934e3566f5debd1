//! # Account Service
//!
//! The account lifecycle flows that combine users, tokens and passwords.
//!
//! ```text
//! register ──► user (inactive) + activation token
//!                     │
//! activate(token) ◄───┘  set activated (CAS), revoke activation tokens
//!
//! login(email, password) ──► authentication token
//!
//! request_password_reset(email) ──► reset token (activated users only)
//!                     │
//! reset_password(token, new) ◄──┘  new hash (CAS), revoke reset tokens
//! ```
//!
//! Token plaintexts are returned to the caller for delivery and are never
//! logged here.

use chrono::Duration;
use tracing::{debug, info};

use cashcow_core::{
    CandidatePassword, NewUser, PasswordHasher, Token, TokenScope, User, ValidationError,
};

use crate::auth::{AuthError, AuthResult};
use crate::error::DbError;
use crate::pool::Database;

/// Lifetimes of the tokens the service issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    pub activation: Duration,
    pub authentication: Duration,
    pub password_reset: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        TokenTtls {
            activation: Duration::days(3),
            authentication: Duration::hours(24),
            password_reset: Duration::minutes(45),
        }
    }
}

/// Registration, activation, login and password reset.
#[derive(Debug, Clone)]
pub struct AccountService {
    db: Database,
    hasher: PasswordHasher,
    ttls: TokenTtls,
}

impl AccountService {
    pub fn new(db: Database, hasher: PasswordHasher, ttls: TokenTtls) -> Self {
        AccountService { db, hasher, ttls }
    }

    /// Creates an inactive user and an activation token for them.
    pub async fn register(&self, input: &NewUser) -> AuthResult<(User, Token)> {
        let user = self.db.users().create(input, &self.hasher).await?;
        let token = self
            .db
            .tokens()
            .issue(user.id, self.ttls.activation, TokenScope::Activation)
            .await?;

        info!(user_id = user.id, "User registered");
        Ok((user, token))
    }

    /// Activates the owner of an activation token.
    ///
    /// ## Returns
    /// * `Err(Store(Validation))` - token malformed, unknown or expired, or
    ///   its owner was deleted
    /// * `Err(Store(EditConflict))` - the user changed since the token was resolved
    pub async fn activate(&self, plaintext: &str) -> AuthResult<User> {
        let mut user = self
            .resolve_or_invalid(
                TokenScope::Activation,
                plaintext,
                "invalid or expired activation token",
            )
            .await?;

        user.is_activated = true;
        self.db.users().update(&mut user).await?;
        self.db
            .tokens()
            .revoke_all(TokenScope::Activation, user.id)
            .await?;

        info!(user_id = user.id, "User activated");
        Ok(user)
    }

    /// Checks email and password and issues an authentication token.
    ///
    /// Unknown email, deleted account and wrong password all give
    /// `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Token> {
        let user = match self.db.users().get_by_email(email).await {
            Ok(user) if !user.is_deleted => user,
            Ok(_) | Err(DbError::NotFound { .. }) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        let matches = self
            .hasher
            .verify(&user.password, password)
            .map_err(DbError::from)?;
        if !matches {
            debug!(user_id = user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self
            .db
            .tokens()
            .issue(user.id, self.ttls.authentication, TokenScope::Authentication)
            .await?;
        debug!(user_id = user.id, "Login succeeded");
        Ok(token)
    }

    /// Issues a password reset token for an activated account.
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<Token> {
        let user = match self.db.users().get_by_email(email).await {
            Ok(user) if !user.is_deleted => user,
            Ok(_) | Err(DbError::NotFound { .. }) => {
                return Err(DbError::invalid(
                    "email",
                    ValidationError::Rule("no matching email address found"),
                )
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        if !user.is_activated {
            return Err(AuthError::InactiveAccount);
        }

        let token = self
            .db
            .tokens()
            .issue(user.id, self.ttls.password_reset, TokenScope::PasswordReset)
            .await?;
        debug!(user_id = user.id, "Password reset requested");
        Ok(token)
    }

    /// Sets a new password for the owner of a reset token.
    pub async fn reset_password(
        &self,
        plaintext: &str,
        password: &CandidatePassword,
    ) -> AuthResult<User> {
        password
            .check()
            .map_err(|e| DbError::invalid("password", e))?;

        let mut user = self
            .resolve_or_invalid(
                TokenScope::PasswordReset,
                plaintext,
                "invalid or expired password reset token",
            )
            .await?;

        self.db
            .users()
            .change_password(&mut user, password, &self.hasher)
            .await?;
        self.db
            .tokens()
            .revoke_all(TokenScope::PasswordReset, user.id)
            .await?;

        info!(user_id = user.id, "Password reset");
        Ok(user)
    }

    /// Resolves a single-use token. A deleted owner reads as an invalid token.
    async fn resolve_or_invalid(
        &self,
        scope: TokenScope,
        plaintext: &str,
        message: &'static str,
    ) -> AuthResult<User> {
        match self.db.tokens().resolve(scope, plaintext).await {
            Ok(user) if !user.is_deleted => Ok(user),
            Ok(user) => {
                debug!(user_id = user.id, ?scope, "Token owner is deleted");
                Err(DbError::invalid("token", ValidationError::Rule(message)).into())
            }
            Err(DbError::NotFound { .. } | DbError::Validation(_)) => {
                Err(DbError::invalid("token", ValidationError::Rule(message)).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{hasher, new_user, test_db};

    async fn service() -> AccountService {
        AccountService::new(test_db().await, hasher(), TokenTtls::default())
    }

    fn token_error(err: AuthError) -> String {
        match err {
            AuthError::Store(DbError::Validation(errors)) => {
                errors.get("token").unwrap_or_default().to_string()
            }
            other => panic!("expected token validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_then_activate() {
        let svc = service().await;
        let (user, token) = svc.register(&new_user(1)).await.unwrap();
        assert!(!user.is_activated);
        assert_eq!(token.scope, TokenScope::Activation);

        let activated = svc.activate(&token.plaintext).await.unwrap();
        assert!(activated.is_activated);
        assert_eq!(activated.version, user.version + 1);

        // Consumed tokens are revoked.
        let err = svc.activate(&token.plaintext).await.unwrap_err();
        assert_eq!(token_error(err), "invalid or expired activation token");
    }

    #[tokio::test]
    async fn test_deleted_user_cannot_activate() {
        let svc = service().await;
        let (user, token) = svc.register(&new_user(1)).await.unwrap();
        let mut stored = svc.db.users().get_by_id(user.id).await.unwrap();
        svc.db.users().soft_delete(&mut stored).await.unwrap();

        let err = svc.activate(&token.plaintext).await.unwrap_err();
        assert_eq!(token_error(err), "invalid or expired activation token");

        let after = svc.db.users().get_by_id(user.id).await.unwrap();
        assert!(after.is_deleted);
        assert!(!after.is_activated);
        assert_eq!(after.version, stored.version);
    }

    #[tokio::test]
    async fn test_deleted_user_cannot_reset_password() {
        let svc = service().await;
        let (user, activation) = svc.register(&new_user(1)).await.unwrap();
        svc.activate(&activation.plaintext).await.unwrap();
        let reset = svc
            .request_password_reset("farmer1@example.com")
            .await
            .unwrap();
        let mut stored = svc.db.users().get_by_id(user.id).await.unwrap();
        svc.db.users().soft_delete(&mut stored).await.unwrap();

        let fresh = CandidatePassword::new("N3w-Pa55word");
        let err = svc.reset_password(&reset.plaintext, &fresh).await.unwrap_err();
        assert_eq!(token_error(err), "invalid or expired password reset token");
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let svc = service().await;
        svc.register(&new_user(1)).await.unwrap();

        let mut again = new_user(2);
        again.email = "FARMER1@example.com".to_string();
        assert!(matches!(
            svc.register(&again).await,
            Err(AuthError::Store(DbError::UniqueViolation { .. }))
        ));
    }

    #[tokio::test]
    async fn test_login() {
        let svc = service().await;
        svc.register(&new_user(1)).await.unwrap();

        let token = svc.login("farmer1@example.com", "Pa55word!").await.unwrap();
        assert_eq!(token.scope, TokenScope::Authentication);
        let owner = svc
            .db
            .tokens()
            .resolve(TokenScope::Authentication, &token.plaintext)
            .await
            .unwrap();
        assert_eq!(owner.email, "farmer1@example.com");

        assert!(matches!(
            svc.login("farmer1@example.com", "Wrong-pa55").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("nobody@example.com", "Pa55word!").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_password_reset_requires_activation() {
        let svc = service().await;
        let (_, activation) = svc.register(&new_user(1)).await.unwrap();

        assert!(matches!(
            svc.request_password_reset("farmer1@example.com").await,
            Err(AuthError::InactiveAccount)
        ));

        svc.activate(&activation.plaintext).await.unwrap();
        let reset = svc
            .request_password_reset("farmer1@example.com")
            .await
            .unwrap();
        assert_eq!(reset.scope, TokenScope::PasswordReset);
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let svc = service().await;
        let (_, activation) = svc.register(&new_user(1)).await.unwrap();
        svc.activate(&activation.plaintext).await.unwrap();
        let reset = svc
            .request_password_reset("farmer1@example.com")
            .await
            .unwrap();

        let weak = CandidatePassword::new("password");
        assert!(matches!(
            svc.reset_password(&reset.plaintext, &weak).await,
            Err(AuthError::Store(DbError::Validation(_)))
        ));

        let fresh = CandidatePassword::new("N3w-Pa55word");
        svc.reset_password(&reset.plaintext, &fresh).await.unwrap();

        assert!(svc.login("farmer1@example.com", "N3w-Pa55word").await.is_ok());
        assert!(matches!(
            svc.login("farmer1@example.com", "Pa55word!").await,
            Err(AuthError::InvalidCredentials)
        ));

        let err = svc
            .reset_password(&reset.plaintext, &fresh)
            .await
            .unwrap_err();
        assert_eq!(token_error(err), "invalid or expired password reset token");
    }

    #[tokio::test]
    async fn test_reset_unknown_email() {
        let svc = service().await;
        match svc.request_password_reset("ghost@example.com").await {
            Err(AuthError::Store(DbError::Validation(errors))) => {
                assert_eq!(errors.get("email"), Some("no matching email address found"))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
