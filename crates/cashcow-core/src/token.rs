//! # Bearer Tokens
//!
//! Opaque, scoped, short-lived capabilities.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  generate()            16 random bytes (OS RNG)                         │
//! │      │                       │                                          │
//! │      │                       ▼                                          │
//! │      │            base64url, no padding  ──► plaintext (22 chars)       │
//! │      │                       │               returned ONCE, never stored│
//! │      │                       ▼                                          │
//! │      │                  SHA-256 digest   ──► hash (32 bytes, stored)    │
//! │      ▼                                                                  │
//! │  Token { plaintext, hash, user_id, expiry, scope }                      │
//! │                                                                         │
//! │  resolve: check shape ─► digest(plaintext) ─► (scope, hash, expiry>now) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError, ValidationErrors};
use crate::validation::ValidationResult;

/// Random bytes behind each token.
pub const TOKEN_ENTROPY_BYTES: usize = 16;

/// Length of an encoded plaintext (16 bytes, base64url, no padding).
pub const TOKEN_PLAINTEXT_LEN: usize = 22;

// =============================================================================
// Token Scope
// =============================================================================

/// The flow a token may be consumed by.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TokenScope {
    Activation,
    Authentication,
    PasswordReset,
}

impl TokenScope {
    pub const ALL: [TokenScope; 3] = [
        TokenScope::Activation,
        TokenScope::Authentication,
        TokenScope::PasswordReset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
            TokenScope::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenScope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| CoreError::InvalidScope(s.to_string()))
    }
}

// =============================================================================
// Token
// =============================================================================

/// A freshly generated token.
///
/// Only `token` and `expiry` serialize: that is the body handed back to the
/// client. Debug output never shows the plaintext.
#[derive(Clone, Serialize, TS)]
#[ts(export)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,

    #[serde(skip)]
    pub hash: Vec<u8>,

    #[serde(skip)]
    pub user_id: i64,

    #[ts(as = "String")]
    pub expiry: DateTime<Utc>,

    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    /// Generates a token for `user_id` that expires `ttl` from now.
    ///
    /// ## Returns
    /// - `Err(CoreError::Validation)` if `now + ttl` is past the representable range
    /// - `Err(CoreError::TokenGeneration)` if the OS RNG fails
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> CoreResult<Token> {
        Token::generate_at(user_id, Utc::now(), ttl, scope)
    }

    /// Same as [`Token::generate`] with an explicit clock reading.
    pub fn generate_at(
        user_id: i64,
        now: DateTime<Utc>,
        ttl: Duration,
        scope: TokenScope,
    ) -> CoreResult<Token> {
        let expiry = now.checked_add_signed(ttl).ok_or_else(|| {
            ValidationErrors::single("ttl", ValidationError::Rule("is too large"))
        })?;

        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CoreError::TokenGeneration(e.to_string()))?;

        let plaintext = URL_SAFE_NO_PAD.encode(bytes);
        let hash = digest(&plaintext);

        Ok(Token {
            plaintext,
            hash,
            user_id,
            expiry,
            scope,
        })
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"***")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}

/// SHA-256 of a token plaintext. This is what the store keys on.
pub fn digest(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Checks that a plaintext could be a token before any store access.
pub fn validate_plaintext(plaintext: &str) -> ValidationResult<()> {
    if plaintext.is_empty() {
        return Err(ValidationError::Required);
    }
    if plaintext.chars().count() != TOKEN_PLAINTEXT_LEN {
        return Err(ValidationError::Rule("must be 22 characters long"));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
