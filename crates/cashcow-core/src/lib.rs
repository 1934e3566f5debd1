//! # cashcow-core: Domain Rules for Cash Cow
//!
//! Identity, credentials, tokens, permissions and the list-query contract
//! for the Cash Cow livestock marketplace. Pure types and functions: no
//! database, no network, no files.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cash Cow Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP handlers (outside this workspace)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     cashcow-db: repositories, versioned store, auth, service    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cashcow-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐ ┌───────────┐ ┌────────────┐ ┌────────────┐   │   │
//! │  │   │ credential │ │   token   │ │ permission │ │  filters   │   │   │
//! │  │   │  Argon2id  │ │ 16B→b64url│ │ code sets  │ │ MetaData   │   │   │
//! │  │   └────────────┘ └───────────┘ └────────────┘ └────────────┘   │   │
//! │  │   ┌────────────┐ ┌───────────┐ ┌────────────┐ ┌────────────┐   │   │
//! │  │   │    user    │ │ principal │ │  catalog   │ │ validation │   │   │
//! │  │   └────────────┘ └───────────┘ └────────────┘ └────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`credential`] - Password policy, Argon2id hashing and verification
//! - [`token`] - Scoped bearer tokens and their digests
//! - [`permission`] - Permission catalogue entries and code sets
//! - [`user`] - The User aggregate, registration input, list filter
//! - [`principal`] - Anonymous vs authenticated caller
//! - [`filters`] - Paging state, sort safelists, result metadata
//! - [`catalog`] - Breed and Region entities
//! - [`validation`] - Field validators and the error collector
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use cashcow_core::credential::{CandidatePassword, HashingParams, PasswordHasher};
//!
//! let hasher = PasswordHasher::new(HashingParams::fast_for_tests()).unwrap();
//! let credential = hasher.hash(&CandidatePassword::new("Pa55word!")).unwrap();
//!
//! assert!(hasher.verify(&credential, "Pa55word!").unwrap());
//! assert!(!hasher.verify(&credential, "wrong").unwrap());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod credential;
pub mod error;
pub mod filters;
pub mod permission;
pub mod principal;
pub mod token;
pub mod user;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use catalog::{Breed, BreedFilter, NewBreed, NewRegion, Region, RegionFilter};
pub use credential::{CandidatePassword, HashingParams, PasswordCredential, PasswordHasher};
pub use error::{CoreError, CoreResult, ValidationError, ValidationErrors};
pub use filters::{Filters, MetaData, PageRequest, SortDirection};
pub use permission::{NewPermission, Permission, Permissions};
pub use principal::Principal;
pub use token::{Token, TokenScope};
pub use user::{NewUser, User, UserFilter};
