//! Key suppliers for token verification.
//!
//! A [`KeySupplier`] yields the candidate verification keys for a request and
//! token header. Every call returns a fresh, finite [`KeyStream`], so a
//! verifier can stop at the first key that matches without affecting later
//! calls.
//!
//! Implementations:
//!
//! - [`KeyManager`](crate::keys::KeyManager) - current and archived keys from the local store
//! - [`RemoteJwks`] - keys fetched from a JWKS endpoint
//! - [`StaticKeys`] - a fixed list, useful for tests and pinned keys

pub mod remote;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::crypto::KeyHandle;
use crate::error::AuthError;
use crate::request::RequestContext;
use crate::token::JwtHeader;

pub use remote::{GOOGLE_JWKS_URL, RemoteJwks};

/// Stream of candidate verification keys.
pub type KeyStream = BoxStream<'static, Result<KeyHandle, SupplierError>>;

/// Errors produced while supplying keys.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SupplierError {
    /// The key source could not be reached or returned an unusable response.
    #[error("Key source unavailable ({location}): {message}")]
    Unavailable {
        /// Where keys were being fetched from.
        location: String,
        /// Description of the failure.
        message: String,
    },

    /// Reading local key material failed.
    #[error(transparent)]
    Local(#[from] AuthError),
}

impl SupplierError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl From<SupplierError> for AuthError {
    fn from(err: SupplierError) -> Self {
        match err {
            SupplierError::Unavailable { location, message } => {
                AuthError::key_source_unavailable(location, message)
            }
            SupplierError::Local(err) => err,
        }
    }
}

/// Source of verification keys.
#[async_trait]
pub trait KeySupplier: Send + Sync {
    /// Returns the candidate keys for verifying a token with `header`.
    ///
    /// `header` is `None` when the caller has no token header, e.g. when
    /// checking a refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the key source cannot be read at all. Failures
    /// after the stream has started are yielded as stream items.
    async fn keys(
        &self,
        req: &RequestContext,
        header: Option<&JwtHeader>,
    ) -> Result<KeyStream, SupplierError>;
}

/// Returns `true` if `key` may be used for a token with `header`.
///
/// A key is skipped only when both the header and the key carry a key id
/// and the two differ.
#[must_use]
pub fn matches_kid(key: &KeyHandle, header: Option<&JwtHeader>) -> bool {
    match (header.and_then(|h| h.kid.as_deref()), key.kid()) {
        (Some(wanted), Some(kid)) => wanted == kid,
        _ => true,
    }
}

/// A fixed set of keys.
#[derive(Debug, Clone, Default)]
pub struct StaticKeys {
    keys: Vec<KeyHandle>,
}

impl StaticKeys {
    /// Creates a supplier for `keys`, in order.
    #[must_use]
    pub fn new(keys: Vec<KeyHandle>) -> Self {
        Self { keys }
    }

    /// Creates a supplier for a single key.
    #[must_use]
    pub fn single(key: KeyHandle) -> Self {
        Self { keys: vec![key] }
    }
}

#[async_trait]
impl KeySupplier for StaticKeys {
    async fn keys(
        &self,
        _req: &RequestContext,
        header: Option<&JwtHeader>,
    ) -> Result<KeyStream, SupplierError> {
        let keys: Vec<_> = self
            .keys
            .iter()
            .filter(|key| matches_kid(key, header))
            .cloned()
            .map(Ok)
            .collect();
        Ok(stream::iter(keys).boxed())
    }
}
