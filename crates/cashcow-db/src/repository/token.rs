//! # Token Repository
//!
//! Append-only token storage: insert, resolve, scoped mass delete.
//!
//! ```text
//! issue(user, ttl, scope)    Token::generate ─► INSERT (hash, user_id, expiry, scope)
//! resolve(scope, plaintext)  shape check ─► digest ─► JOIN users
//!                            WHERE scope = ? AND hash = ? AND expiry > now
//! revoke_all(scope, user)    DELETE WHERE scope = ? AND user_id = ?
//! ```
//!
//! Resolve answers `NotFound` for a wrong token, an expired token and a
//! token from another scope alike.

use chrono::{Duration, Utc};
use tracing::debug;

use cashcow_core::token::{digest, validate_plaintext};
use cashcow_core::{Token, TokenScope, User};

use crate::error::{DbError, DbResult};
use crate::repository::RepoContext;
use crate::timeout::bounded;

/// Repository for bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenRepository {
    ctx: RepoContext,
}

impl TokenRepository {
    pub fn new(ctx: RepoContext) -> Self {
        TokenRepository { ctx }
    }

    /// Generates a token and stores its digest.
    ///
    /// The returned `Token` holds the only copy of the plaintext.
    pub async fn issue(&self, user_id: i64, ttl: Duration, scope: TokenScope) -> DbResult<Token> {
        let token = Token::generate(user_id, ttl, scope)?;
        self.insert(&token).await?;
        debug!(user_id, scope = %scope, expiry = %token.expiry, "Token issued");
        Ok(token)
    }

    /// Stores a generated token by digest.
    pub async fn insert(&self, token: &Token) -> DbResult<()> {
        bounded(self.ctx.query_timeout, "tokens.insert", async {
            sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES (?, ?, ?, ?)")
                .bind(&token.hash)
                .bind(token.user_id)
                .bind(token.expiry)
                .bind(token.scope)
                .execute(&self.ctx.pool)
                .await?;
            Ok(())
        })
        .await
    }

    /// Looks up the owner of a live token in `scope`.
    ///
    /// ## Returns
    /// * `Err(DbError::Validation)` - plaintext empty or not 22 characters
    /// * `Err(DbError::NotFound)` - unknown, expired, or other-scope token
    pub async fn resolve(&self, scope: TokenScope, plaintext: &str) -> DbResult<User> {
        validate_plaintext(plaintext).map_err(|e| DbError::invalid("token", e))?;

        let hash = digest(plaintext);
        bounded(self.ctx.query_timeout, "tokens.resolve", async {
            sqlx::query_as::<_, User>(
                r#"
                SELECT u.id, u.farmer_id, u.email, u.phone_number, u.first_name, u.last_name,
                       u.middle_name, u.password_hash, u.is_activated, u.is_deleted,
                       u.is_verified, u.version, u.created_at, u.updated_at
                FROM users u
                INNER JOIN tokens t ON t.user_id = u.id
                WHERE t.scope = ? AND t.hash = ? AND t.expiry > ?
                "#,
            )
            .bind(scope)
            .bind(hash)
            .bind(Utc::now())
            .fetch_optional(&self.ctx.pool)
            .await?
            .ok_or(DbError::not_found("Token"))
        })
        .await
    }

    /// Deletes every token `user_id` holds in `scope`.
    ///
    /// Returns how many were removed; zero is not an error.
    pub async fn revoke_all(&self, scope: TokenScope, user_id: i64) -> DbResult<u64> {
        let removed = bounded(self.ctx.query_timeout, "tokens.revoke_all", async {
            Ok(sqlx::query("DELETE FROM tokens WHERE scope = ? AND user_id = ?")
                .bind(scope)
                .bind(user_id)
                .execute(&self.ctx.pool)
                .await?
                .rows_affected())
        })
        .await?;

        debug!(user_id, scope = %scope, removed, "Tokens revoked");
        Ok(removed)
    }

    /// Removes expired tokens of every scope.
    pub async fn purge_expired(&self) -> DbResult<u64> {
        bounded(self.ctx.query_timeout, "tokens.purge_expired", async {
            Ok(sqlx::query("DELETE FROM tokens WHERE expiry <= ?")
                .bind(Utc::now())
                .execute(&self.ctx.pool)
                .await?
                .rows_affected())
        })
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{create_user, test_db};

    #[tokio::test]
    async fn test_issue_then_resolve() {
        let db = test_db().await;
        let user = create_user(&db, 1).await;

        let token = db
            .tokens()
            .issue(user.id, Duration::hours(1), TokenScope::Authentication)
            .await
            .unwrap();
        let owner = db
            .tokens()
            .resolve(TokenScope::Authentication, &token.plaintext)
            .await
            .unwrap();

        assert_eq!(owner.id, user.id);
    }

    #[tokio::test]
    async fn test_plaintext_is_not_stored() {
        let db = test_db().await;
        let user = create_user(&db, 1).await;
        let token = db
            .tokens()
            .issue(user.id, Duration::hours(1), TokenScope::Activation)
            .await
            .unwrap();

        let stored: Vec<u8> = sqlx::query_scalar("SELECT hash FROM tokens")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(stored, token.hash);
        assert_ne!(stored, token.plaintext.as_bytes());
    }

    #[tokio::test]
    async fn test_wrong_scope_and_unknown_token_not_found() {
        let db = test_db().await;
        let user = create_user(&db, 1).await;
        let token = db
            .tokens()
            .issue(user.id, Duration::hours(1), TokenScope::Activation)
            .await
            .unwrap();

        assert!(matches!(
            db.tokens()
                .resolve(TokenScope::Authentication, &token.plaintext)
                .await,
            Err(DbError::NotFound { entity: "Token" })
        ));
        assert!(matches!(
            db.tokens()
                .resolve(TokenScope::Activation, "AAAAAAAAAAAAAAAAAAAAAA")
                .await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_expired_token_not_found() {
        let db = test_db().await;
        let user = create_user(&db, 1).await;

        let token = Token::generate_at(
            user.id,
            Utc::now() - Duration::hours(2),
            Duration::hours(1),
            TokenScope::PasswordReset,
        )
        .unwrap();
        db.tokens().insert(&token).await.unwrap();

        assert!(matches!(
            db.tokens()
                .resolve(TokenScope::PasswordReset, &token.plaintext)
                .await,
            Err(DbError::NotFound { .. })
        ));
        assert_eq!(db.tokens().purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_plaintext_rejected_before_lookup() {
        let db = test_db().await;
        for bad in ["", "too-short"] {
            match db.tokens().resolve(TokenScope::Authentication, bad).await {
                Err(DbError::Validation(errors)) => assert!(errors.get("token").is_some()),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_validation_error() {
        let db = test_db().await;
        let user = create_user(&db, 1).await;

        match db
            .tokens()
            .issue(user.id, Duration::days(365 * 300_000), TokenScope::Authentication)
            .await
        {
            Err(DbError::Validation(errors)) => assert!(errors.get("ttl").is_some()),
            other => panic!("expected validation error, got {other:?}"),
        }
        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tokens")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn test_revoke_is_scoped() {
        let db = test_db().await;
        let user = create_user(&db, 1).await;
        let tokens = db.tokens();

        let a = tokens
            .issue(user.id, Duration::hours(1), TokenScope::Activation)
            .await
            .unwrap();
        let b = tokens
            .issue(user.id, Duration::hours(1), TokenScope::Activation)
            .await
            .unwrap();
        let auth = tokens
            .issue(user.id, Duration::hours(1), TokenScope::Authentication)
            .await
            .unwrap();

        // Concurrent issuance for the same (user, scope) leaves both valid.
        assert!(tokens.resolve(TokenScope::Activation, &a.plaintext).await.is_ok());
        assert!(tokens.resolve(TokenScope::Activation, &b.plaintext).await.is_ok());

        assert_eq!(tokens.revoke_all(TokenScope::Activation, user.id).await.unwrap(), 2);
        assert!(tokens.resolve(TokenScope::Activation, &a.plaintext).await.is_err());
        assert!(tokens
            .resolve(TokenScope::Authentication, &auth.plaintext)
            .await
            .is_ok());
        assert_eq!(tokens.revoke_all(TokenScope::Activation, user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tokens_cascade_with_user() {
        let db = test_db().await;
        let user = create_user(&db, 1).await;
        let token = db
            .tokens()
            .issue(user.id, Duration::hours(1), TokenScope::Authentication)
            .await
            .unwrap();

        db.users().hard_delete(user.id).await.unwrap();
        assert!(db
            .tokens()
            .resolve(TokenScope::Authentication, &token.plaintext)
            .await
            .is_err());
    }
}
