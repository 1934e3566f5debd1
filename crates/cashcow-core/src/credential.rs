//! # Credential Vault
//!
//! Password policy, hashing and verification.
//!
//! ## Two Types, Two Lifetimes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   request body ──► CandidatePassword ──check()──► PasswordHasher::hash  │
//! │                    (plaintext, short-lived,          │                  │
//! │                     never serialized)                ▼                  │
//! │                                              PasswordCredential         │
//! │                                              (Argon2id PHC string,      │
//! │                                               the only thing stored)    │
//! │                                                                         │
//! │   login ──► PasswordHasher::verify(credential, plaintext) ──► bool      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A mismatch is `Ok(false)`. Only an unparseable hash or a broken hasher
//! yields `CoreError::HashingFailed`.

use std::fmt;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier, Version};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError, ValidationErrors};
use crate::validation::ValidationResult;

/// Minimum password length in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Maximum password length in characters.
pub const MAX_PASSWORD_CHARS: usize = 72;

// =============================================================================
// Candidate Password
// =============================================================================

/// A plaintext password supplied for a create or change operation.
///
/// Debug output is redacted and the type is never serialized outward.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct CandidatePassword(String);

impl CandidatePassword {
    pub fn new(plaintext: impl Into<String>) -> Self {
        CandidatePassword(plaintext.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Applies the password policy.
    ///
    /// ## Rules (first failure reported)
    /// - Must be provided
    /// - 8 to 72 characters
    /// - At least one digit, one uppercase, one lowercase and one
    ///   non-alphanumeric character
    pub fn check(&self) -> ValidationResult<()> {
        let pw = self.0.as_str();

        if pw.is_empty() {
            return Err(ValidationError::Required);
        }

        let len = pw.chars().count();
        if len < MIN_PASSWORD_CHARS {
            return Err(ValidationError::TooShort {
                min: MIN_PASSWORD_CHARS,
            });
        }
        if len > MAX_PASSWORD_CHARS {
            return Err(ValidationError::TooLong {
                max: MAX_PASSWORD_CHARS,
            });
        }

        if !pw.chars().any(|c| c.is_ascii_digit()) {
            return Err(ValidationError::Rule("must contain at least one number"));
        }
        if !pw.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::Rule(
                "must contain at least one uppercase letter",
            ));
        }
        if !pw.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(ValidationError::Rule(
                "must contain at least one lowercase letter",
            ));
        }
        if !pw.chars().any(|c| !c.is_ascii_alphanumeric()) {
            return Err(ValidationError::Rule(
                "must contain at least one special character",
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for CandidatePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CandidatePassword(***)")
    }
}

// =============================================================================
// Password Credential
// =============================================================================

/// The at-rest form of a password: an Argon2id PHC string.
#[derive(Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct PasswordCredential(String);

impl PasswordCredential {
    /// Wraps a stored PHC string.
    pub fn from_phc(phc: impl Into<String>) -> Self {
        PasswordCredential(phc.into())
    }

    pub fn as_phc(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("PasswordCredential(<empty>)")
        } else {
            f.write_str("PasswordCredential(***)")
        }
    }
}

// =============================================================================
// Hashing Parameters
// =============================================================================

/// Argon2id work factor.
///
/// Defaults follow the OWASP baseline (19 MiB, 2 passes, 1 lane).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        HashingParams {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashingParams {
    /// Smallest parameters Argon2 accepts. Never use outside tests.
    pub fn fast_for_tests() -> Self {
        HashingParams {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn to_argon2(self) -> CoreResult<Params> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| CoreError::HashingFailed(format!("invalid parameters: {e}")))
    }

    /// Checks the parameters without hashing anything.
    pub fn validate(&self) -> CoreResult<()> {
        self.to_argon2().map(|_| ())
    }
}

// =============================================================================
// Password Hasher
// =============================================================================

/// Hashes and verifies passwords with Argon2id.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(params: HashingParams) -> CoreResult<Self> {
        Ok(PasswordHasher {
            params: params.to_argon2()?,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Validates the candidate, then hashes it with a fresh random salt.
    ///
    /// ## Returns
    /// - `Err(CoreError::Validation)` with a `password` entry if the policy fails
    /// - `Err(CoreError::HashingFailed)` on hasher failure
    pub fn hash(&self, candidate: &CandidatePassword) -> CoreResult<PasswordCredential> {
        candidate
            .check()
            .map_err(|e| ValidationErrors::single("password", e))?;

        let salt = SaltString::generate(&mut OsRng);
        let phc = self
            .argon2()
            .hash_password(candidate.as_str().as_bytes(), &salt)
            .map_err(|e| CoreError::HashingFailed(e.to_string()))?
            .to_string();

        Ok(PasswordCredential(phc))
    }

    /// Checks `plaintext` against a stored credential.
    ///
    /// Cost parameters come from the PHC string, so hashes made under older
    /// parameters still verify.
    pub fn verify(&self, credential: &PasswordCredential, plaintext: &str) -> CoreResult<bool> {
        let parsed = PasswordHash::new(credential.as_phc())
            .map_err(|e| CoreError::HashingFailed(format!("invalid hash format: {e}")))?;

        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CoreError::HashingFailed(e.to_string())),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(HashingParams::fast_for_tests()).unwrap()
    }

    #[test]
    fn test_policy_accepts_strong_password() {
        assert!(CandidatePassword::new("Pa55word!").check().is_ok());
    }

    #[test]
    fn test_policy_rejections_in_order() {
        let cases = [
            ("", "must be provided"),
            ("Ab1!", "must be at least 8 characters long"),
            ("passwordA!", "must contain at least one number"),
            ("password1!", "must contain at least one uppercase letter"),
            ("PASSWORD1!", "must contain at least one lowercase letter"),
            ("Password12", "must contain at least one special character"),
        ];
        for (input, message) in cases {
            let err = CandidatePassword::new(input).check().unwrap_err();
            assert_eq!(err.to_string(), message, "input {input:?}");
        }

        let long = format!("Aa1!{}", "x".repeat(69));
        assert_eq!(
            CandidatePassword::new(long).check(),
            Err(ValidationError::TooLong { max: 72 })
        );
    }

    #[test]
    fn test_hash_then_verify() {
        let h = hasher();
        let credential = h.hash(&CandidatePassword::new("Pa55word!")).unwrap();

        assert!(!credential.is_empty());
        assert!(credential.as_phc().starts_with("$argon2id$"));
        assert!(h.verify(&credential, "Pa55word!").unwrap());
        assert!(!h.verify(&credential, "Pa55word?").unwrap());
    }

    #[test]
    fn test_same_password_gets_fresh_salt() {
        let h = hasher();
        let a = h.hash(&CandidatePassword::new("Pa55word!")).unwrap();
        let b = h.hash(&CandidatePassword::new("Pa55word!")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_weak_password_never_hashed() {
        let err = hasher().hash(&CandidatePassword::new("weak")).unwrap_err();
        match err {
            CoreError::Validation(errors) => {
                assert_eq!(errors.get("password"), Some("must be at least 8 characters long"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_hash_is_operational_error() {
        let err = hasher()
            .verify(&PasswordCredential::from_phc("not-a-phc"), "Pa55word!")
            .unwrap_err();
        assert!(matches!(err, CoreError::HashingFailed(_)));
    }

    #[test]
    fn test_debug_is_redacted() {
        let debug = format!("{:?}", CandidatePassword::new("Pa55word!"));
        assert!(!debug.contains("Pa55word"));
    }

    #[test]
    fn test_bad_params_rejected() {
        let params = HashingParams {
            memory_kib: 0,
            iterations: 0,
            parallelism: 0,
        };
        assert!(params.validate().is_err());
        assert!(HashingParams::default().validate().is_ok());
    }
}
