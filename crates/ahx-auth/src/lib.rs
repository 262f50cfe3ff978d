//! # ahx-auth
//!
//! Token lifecycle engine for AHX hosts and addons.
//!
//! This crate provides:
//! - Compact signed token issuing and verification
//! - Signing key generation, rotation, archival and purge
//! - JWKS publication and remote JWKS consumption
//! - A revocation registry with expiring and non-expiring buckets
//! - Google ID token verification
//!
//! ## Modules
//!
//! - [`alg`] - Algorithm codes and their signing parameters
//! - [`crypto`] - Key handles, key pairs and signature primitives
//! - [`jwk`] - JWK import and export
//! - [`keys`] - The [`KeyManager`] key lifecycle
//! - [`token`] - Token creation and verification
//! - [`supplier`] - Sources of verification keys
//! - [`revocation`] - Revoked token registry
//! - [`federation`] - Tokens from external identity providers
//! - [`http`] - Axum handlers
//! - [`config`] - Configuration
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ahx_auth::prelude::*;
//! use ahx_store::MemoryStore;
//!
//! let keys = KeyManager::new(Arc::new(MemoryStore::new()), &AuthConfig::default())?;
//! let req = RequestContext::from_url("https://addon.example.com/login")?;
//!
//! let claims = JwtClaims::new().with("sub", "user-1");
//! let token = create_token(&req, &keys, claims, &CreateTokenOptions::new()).await?;
//!
//! if let Some(token) = token {
//!     let claims = verify_token(&req, &token, &keys, VerifyMode::Access).await?;
//! }
//! ```

pub mod alg;
pub mod config;
pub mod crypto;
mod encoding;
pub mod error;
pub mod federation;
pub mod http;
pub mod jwk;
pub mod keys;
pub mod request;
pub mod revocation;
pub mod supplier;
pub mod token;

pub use alg::{AlgorithmCode, AlgorithmDescriptor, KeyAlgorithm, KeyFamily};
pub use config::{AuthConfig, ConfigError};
pub use crypto::{CryptoError, KeyHandle, KeyPair, KeyType, KeyUsage};
pub use error::{AuthError, ErrorCategory};
pub use jwk::{Jwk, Jwks};
pub use keys::KeyManager;
pub use request::RequestContext;
pub use revocation::{RevocationBucket, RevocationRegistry, TokenOrClaims};
pub use supplier::{KeyStream, KeySupplier, RemoteJwks, StaticKeys, SupplierError};
pub use token::{
    CreateTokenOptions, JwtClaims, JwtHeader, Tokens, VerifyMode, create_token, create_tokens,
    decode_token_payload, verify_refresh_token, verify_token,
};

/// Type alias for token lifecycle results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use ahx_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::alg::AlgorithmCode;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::crypto::{KeyHandle, KeyPair};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::federation::{VerifyGoogleTokenOptions, verify_google_token};
    pub use crate::jwk::Jwks;
    pub use crate::keys::KeyManager;
    pub use crate::request::RequestContext;
    pub use crate::revocation::RevocationRegistry;
    pub use crate::supplier::{KeySupplier, RemoteJwks, StaticKeys};
    pub use crate::token::{
        CreateTokenOptions, JwtClaims, Tokens, VerifyMode, create_token, create_tokens,
        decode_token_payload, verify_refresh_token, verify_token,
    };
}
