//! Revoked token registry.
//!
//! Records are keyed by token id (`jti`) and bucketed by expiry:
//!
//! ```text
//! [ns, "revoked", "exp", <exp>, <jti>]   tokens with an integer exp
//! [ns, "revoked", "inf", <jti>]          tokens without one
//! ```
//!
//! Expiring records can be dropped once the token would be rejected as
//! expired anyway. Records without an expiry are dropped only when the stored
//! token stops verifying, e.g. after its signing key has been purged.

use std::sync::Arc;

use ahx_store::{DynKeyStore, PathSegment, StorePath};
use serde_json::Value;

use crate::AuthResult;
use crate::keys::KeyManager;
use crate::request::RequestContext;
use crate::supplier::KeySupplier;
use crate::token::{JwtClaims, VerifyMode, decode_token_payload, now_seconds, verify_token};

/// Which bucket a revocation record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevocationBucket {
    /// The token expires at this unix time.
    Expiring(i64),
    /// The token has no usable expiry.
    Infinite,
}

impl RevocationBucket {
    /// Buckets by `exp` when it is a safe positive integer.
    #[must_use]
    pub fn from_claims(claims: &JwtClaims) -> Self {
        claims
            .exp_safe_integer()
            .map_or(Self::Infinite, Self::Expiring)
    }
}

/// A token to look up: either the raw token or its decoded claims.
#[derive(Debug, Clone, Copy)]
pub enum TokenOrClaims<'a> {
    /// A compact token; only its payload is decoded.
    Token(&'a str),
    /// Already decoded claims.
    Claims(&'a JwtClaims),
}

impl<'a> From<&'a str> for TokenOrClaims<'a> {
    fn from(token: &'a str) -> Self {
        Self::Token(token)
    }
}

impl<'a> From<&'a JwtClaims> for TokenOrClaims<'a> {
    fn from(claims: &'a JwtClaims) -> Self {
        Self::Claims(claims)
    }
}

/// Persistent registry of revoked tokens.
#[derive(Clone)]
pub struct RevocationRegistry {
    store: DynKeyStore,
    namespace: String,
    supplier: Arc<dyn KeySupplier>,
}

impl RevocationRegistry {
    /// Creates a registry that verifies tokens with `supplier` before
    /// recording them.
    #[must_use]
    pub fn new(
        store: DynKeyStore,
        namespace: impl Into<String>,
        supplier: Arc<dyn KeySupplier>,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            supplier,
        }
    }

    /// Creates a registry sharing the manager's namespace and verifying
    /// against its keys.
    #[must_use]
    pub fn for_manager(store: DynKeyStore, keys: &KeyManager) -> Self {
        Self::new(store, keys.namespace(), Arc::new(keys.clone()))
    }

    /// Records `token` as revoked.
    ///
    /// Returns `Ok(false)` without writing if the token does not verify or
    /// has no `jti`.
    ///
    /// # Errors
    ///
    /// Returns an error if verification keys cannot be read or the record
    /// cannot be written.
    pub async fn revoke_token(&self, req: &RequestContext, token: &str) -> AuthResult<bool> {
        let Some(claims) = verify_token(req, token, self.supplier.as_ref(), VerifyMode::Access).await?
        else {
            return Ok(false);
        };
        let Some(jti) = claims.jti() else {
            tracing::warn!(reason = "missing jti", sub = ?claims.sub(), "Cannot revoke token");
            return Ok(false);
        };

        let bucket = RevocationBucket::from_claims(&claims);
        let path = self.record_path(bucket, jti);
        self.store
            .set(&path, Value::String(token.to_string()))
            .await?;

        tracing::info!(jti, ?bucket, "Revoked token");
        Ok(true)
    }

    /// Returns `true` if the token has been revoked.
    ///
    /// The signature is not checked; call this after verification.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn is_token_revoked<'a>(
        &self,
        _req: &RequestContext,
        token: impl Into<TokenOrClaims<'a>>,
    ) -> AuthResult<bool> {
        let decoded;
        let claims = match token.into() {
            TokenOrClaims::Token(token) => match decode_token_payload(token) {
                Some(claims) => {
                    decoded = claims;
                    &decoded
                }
                None => return Ok(false),
            },
            TokenOrClaims::Claims(claims) => claims,
        };
        let Some(jti) = claims.jti() else {
            return Ok(false);
        };

        let path = self.record_path(RevocationBucket::from_claims(claims), jti);
        Ok(self.store.get(&path).await?.is_some())
    }

    /// Deletes expiring records whose expiry is in the past.
    ///
    /// Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn purge_expiring_revocations(&self) -> AuthResult<u64> {
        let prefix = self.expiring_prefix();
        let now = now_seconds();
        let mut purged = 0;

        for (path, _) in self.store.list(&prefix).await? {
            let Some(exp) = path.get(prefix.len()).and_then(PathSegment::as_int) else {
                continue;
            };
            if exp < now && self.store.remove(&path).await? {
                purged += 1;
            }
        }

        if purged > 0 {
            tracing::info!(purged, "Purged expired revocations");
        }
        Ok(purged)
    }

    /// Deletes records without an expiry whose token no longer verifies
    /// against `supplier`.
    ///
    /// Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or `supplier` fails.
    pub async fn purge_infinite_revocations(
        &self,
        req: &RequestContext,
        supplier: &dyn KeySupplier,
    ) -> AuthResult<u64> {
        let mut purged = 0;

        for (path, value) in self.store.list(&self.infinite_prefix()).await? {
            let still_valid = match value.as_str() {
                Some(token) => verify_token(req, token, supplier, VerifyMode::Access)
                    .await?
                    .is_some(),
                None => false,
            };
            if !still_valid && self.store.remove(&path).await? {
                purged += 1;
            }
        }

        if purged > 0 {
            tracing::info!(purged, "Purged revocations of unverifiable tokens");
        }
        Ok(purged)
    }

    fn revoked_prefix(&self) -> StorePath {
        StorePath::root(self.namespace.as_str()).child("revoked")
    }

    fn expiring_prefix(&self) -> StorePath {
        self.revoked_prefix().child("exp")
    }

    fn infinite_prefix(&self) -> StorePath {
        self.revoked_prefix().child("inf")
    }

    fn record_path(&self, bucket: RevocationBucket, jti: &str) -> StorePath {
        match bucket {
            RevocationBucket::Expiring(exp) => self.expiring_prefix().child(exp).child(jti),
            RevocationBucket::Infinite => self.infinite_prefix().child(jti),
        }
    }
}

impl std::fmt::Debug for RevocationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationRegistry")
            .field("namespace", &self.namespace)
            .field("store", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}
