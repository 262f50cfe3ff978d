//! Signing key lifecycle: generation, rotation, archival and purge.
//!
//! # Storage layout
//!
//! ```text
//! [ns, "keys", "private"]            current private key (JWK)
//! [ns, "keys", "public", "current"]  current public key (JWK)
//! [ns, "keys", "public", <ts>]       archived public key, keyed by archive time
//! [ns, "keys", "public", <ts>, <n>]  further keys archived within the same second
//! ```
//!
//! # Caching
//!
//! The current pair is loaded lazily. Concurrent callers during a cold start
//! share a single in-flight load, so at most one pair is generated per
//! process. A failed load is cleared and retried by the next caller.
//!
//! The JWKS is cached until the next key mutation (generation, rotation,
//! or a purge that removed something).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ahx_store::{DynKeyStore, PathSegment, StorePath};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;

use crate::alg::AlgorithmCode;
use crate::config::{AuthConfig, env_max_archived_age};
use crate::crypto::{KeyHandle, KeyPair, KeyType};
use crate::error::AuthError;
use crate::jwk::{Jwk, Jwks};
use crate::request::RequestContext;
use crate::supplier::{KeyStream, KeySupplier, SupplierError, matches_kid};
use crate::token::{JwtHeader, now_seconds};
use crate::AuthResult;

type PairFuture = Shared<BoxFuture<'static, AuthResult<Arc<KeyPair>>>>;

enum PairSlot {
    Empty,
    Loading(PairFuture),
    Ready(Arc<KeyPair>),
}

struct CachedJwks {
    epoch: u64,
    jwks: Jwks,
}

struct Inner {
    store: DynKeyStore,
    namespace: String,
    algorithm: AlgorithmCode,
    modulus_bits: usize,
    max_archived_age: Duration,
    slot: Mutex<PairSlot>,
    rotation: tokio::sync::Mutex<()>,
    jwks_epoch: AtomicU64,
    jwks: ArcSwapOption<CachedJwks>,
}

/// Manages the signing key pair and archived verification keys.
///
/// Cloning is cheap; clones share caches and storage.
#[derive(Clone)]
pub struct KeyManager {
    inner: Arc<Inner>,
}

impl KeyManager {
    /// Creates a manager over `store`.
    ///
    /// No store access happens until the first key is needed; call
    /// [`KeyManager::init`] to load eagerly.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if `config` is invalid.
    pub fn new(store: DynKeyStore, config: &AuthConfig) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                namespace: config.namespace.clone(),
                algorithm: config.signing.algorithm,
                modulus_bits: config.signing.modulus_bits,
                max_archived_age: config.keys.max_archived_age,
                slot: Mutex::new(PairSlot::Empty),
                rotation: tokio::sync::Mutex::new(()),
                jwks_epoch: AtomicU64::new(0),
                jwks: ArcSwapOption::empty(),
            }),
        })
    }

    /// Returns the store namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Loads (or generates) the current key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable, the persisted keys are
    /// corrupt, or generation fails.
    pub async fn init(&self) -> AuthResult<()> {
        let pair = self.current_pair().await?;
        tracing::debug!(kid = ?pair.kid(), "Signing keys initialized");
        Ok(())
    }

    /// Returns the current private signing key.
    ///
    /// On a cold start the key is read from the store, or generated and
    /// persisted if the store has none.
    ///
    /// # Errors
    ///
    /// See [`KeyManager::init`].
    pub async fn signing_key(&self) -> AuthResult<KeyHandle> {
        Ok(self.current_pair().await?.private_key.clone())
    }

    /// Returns the current key pair.
    ///
    /// # Errors
    ///
    /// See [`KeyManager::init`].
    pub async fn current_pair(&self) -> AuthResult<Arc<KeyPair>> {
        let load = {
            let mut slot = self.lock_slot();
            match &*slot {
                PairSlot::Ready(pair) => return Ok(Arc::clone(pair)),
                PairSlot::Loading(load) => load.clone(),
                PairSlot::Empty => {
                    let load = spawn_load(Arc::clone(&self.inner));
                    *slot = PairSlot::Loading(load.clone());
                    load
                }
            }
        };

        let result = load.clone().await;

        let mut slot = self.lock_slot();
        if let PairSlot::Loading(current) = &*slot
            && current.ptr_eq(&load)
        {
            *slot = match &result {
                Ok(pair) => PairSlot::Ready(Arc::clone(pair)),
                Err(_) => PairSlot::Empty,
            };
        }
        result
    }

    /// Returns the current public key followed by the archived public keys,
    /// newest first.
    ///
    /// Each call returns an independent stream. Archived keys are not
    /// filtered by age here; [`KeyManager::purge_archived_keys`] removes
    /// old ones.
    #[must_use]
    pub fn verification_keys(&self) -> KeyStream {
        let current = {
            let inner = Arc::clone(&self.inner);
            let cached = self.cached_pair();
            stream::once(async move {
                match cached {
                    Some(pair) => Ok(Some(pair.public_key.clone())),
                    None => inner.read_current_public().await,
                }
            })
            .filter_map(|result| future::ready(result.transpose()))
        };

        let archived = {
            let inner = Arc::clone(&self.inner);
            stream::once(async move { inner.read_archived().await }).flat_map(|result| {
                match result {
                    Ok(keys) => stream::iter(keys.into_iter().map(Ok)).boxed(),
                    Err(e) => stream::iter(vec![Err(e)]).boxed(),
                }
            })
        };

        current
            .chain(archived)
            .map_err(SupplierError::from)
            .boxed()
    }

    /// Archives the current public key and installs a freshly generated pair.
    ///
    /// Tokens signed with the previous key keep verifying until its archive
    /// entry is purged. Archived keys older than the configured maximum age
    /// are purged afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable, the current public key
    /// is corrupt, or generation fails.
    pub async fn rotate_keys(&self) -> AuthResult<()> {
        {
            let _rotation = self.inner.rotation.lock().await;
            let inner = &self.inner;

            let current_path = inner.current_public_path();
            if let Some(value) = inner.store.get(&current_path).await? {
                import_key(&current_path, value.clone(), KeyType::Public)?;

                let archived_at = now_seconds();
                let mut archive_path = inner.archive_path(archived_at);
                let mut sub_slot: i64 = 0;
                while inner.store.get(&archive_path).await?.is_some() {
                    sub_slot += 1;
                    archive_path = inner.archive_path(archived_at).child(sub_slot);
                }
                inner.store.set(&archive_path, value).await?;
                tracing::info!(path = %archive_path, "Archived public key");
            }

            let pair = Arc::new(inner.generate().await?);
            inner.persist(&pair).await?;
            *self.lock_slot() = PairSlot::Ready(Arc::clone(&pair));
            inner.invalidate_jwks();

            tracing::info!(kid = ?pair.kid(), algorithm = %inner.algorithm, "Rotated signing keys");
        }

        self.purge_expired_keys().await?;
        Ok(())
    }

    /// Deletes archived public keys archived more than `max_age` ago.
    ///
    /// Returns the number of keys removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn purge_archived_keys(&self, max_age: Duration) -> AuthResult<u64> {
        let inner = &self.inner;
        let prefix = inner.public_prefix();
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let now = now_seconds();
        let mut purged = 0;

        for (path, _) in inner.store.list(&prefix).await? {
            let Some((archived_at, _)) = archive_slot(&prefix, &path) else {
                continue;
            };
            if now.saturating_sub(archived_at) > max_age && inner.store.remove(&path).await? {
                tracing::debug!(path = %path, "Purged archived public key");
                purged += 1;
            }
        }

        if purged > 0 {
            inner.invalidate_jwks();
            tracing::info!(purged, "Purged archived public keys");
        }
        Ok(purged)
    }

    /// Purges archived keys using the configured maximum age, or
    /// `PUBLIC_KEY_MAX_ARCHIVED_AGE` when set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn purge_expired_keys(&self) -> AuthResult<u64> {
        let max_age = env_max_archived_age().unwrap_or(self.inner.max_archived_age);
        self.purge_archived_keys(max_age).await
    }

    /// Returns the public keys as a JWKS, current key first.
    ///
    /// # Errors
    ///
    /// Returns an error if a key cannot be read or exported.
    pub async fn jwks(&self) -> AuthResult<Jwks> {
        let epoch = self.inner.jwks_epoch.load(Ordering::Acquire);
        if let Some(cached) = self.inner.jwks.load_full()
            && cached.epoch == epoch
        {
            return Ok(cached.jwks.clone());
        }

        let mut jwks = Jwks::new();
        let mut keys = self.verification_keys();
        while let Some(key) = keys.next().await {
            let jwk = key?
                .to_jwk()
                .map_err(|e| AuthError::internal(format!("Failed to export public key: {e}")))?;
            jwks.add_key(jwk);
        }

        self.inner.jwks.store(Some(Arc::new(CachedJwks {
            epoch,
            jwks: jwks.clone(),
        })));
        Ok(jwks)
    }

    fn cached_pair(&self) -> Option<Arc<KeyPair>> {
        match &*self.lock_slot() {
            PairSlot::Ready(pair) => Some(Arc::clone(pair)),
            _ => None,
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, PairSlot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("namespace", &self.inner.namespace)
            .field("algorithm", &self.inner.algorithm)
            .field("store", &self.inner.store.backend_name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeySupplier for KeyManager {
    async fn keys(
        &self,
        _req: &RequestContext,
        header: Option<&JwtHeader>,
    ) -> Result<KeyStream, SupplierError> {
        let header = header.cloned();
        Ok(self
            .verification_keys()
            .try_filter(move |key| future::ready(matches_kid(key, header.as_ref())))
            .boxed())
    }
}

/// Runs the load on its own task so it completes even if every caller is
/// cancelled.
fn spawn_load(inner: Arc<Inner>) -> PairFuture {
    let task = tokio::spawn(async move {
        let _rotation = inner.rotation.lock().await;
        inner.load_or_generate().await.map(Arc::new)
    });

    async move {
        task.await
            .map_err(|e| AuthError::internal(format!("Key load task failed: {e}")))?
    }
    .boxed()
    .shared()
}

impl Inner {
    fn keys_prefix(&self) -> StorePath {
        StorePath::root(self.namespace.as_str()).child("keys")
    }

    fn private_path(&self) -> StorePath {
        self.keys_prefix().child("private")
    }

    fn public_prefix(&self) -> StorePath {
        self.keys_prefix().child("public")
    }

    fn current_public_path(&self) -> StorePath {
        self.public_prefix().child("current")
    }

    fn archive_path(&self, archived_at: i64) -> StorePath {
        self.public_prefix().child(archived_at)
    }

    fn invalidate_jwks(&self) {
        self.jwks_epoch.fetch_add(1, Ordering::AcqRel);
        self.jwks.store(None);
    }

    async fn load_or_generate(&self) -> AuthResult<KeyPair> {
        let private_path = self.private_path();
        if let Some(value) = self.store.get(&private_path).await? {
            let private_key = import_key(&private_path, value, KeyType::Private)?;
            let pair = KeyPair::from_private(private_key)
                .map_err(|e| AuthError::corrupt_key(private_path.to_string(), e.to_string()))?;

            let public_path = self.current_public_path();
            match self.store.get(&public_path).await? {
                Some(value) => {
                    import_key(&public_path, value, KeyType::Public)?;
                }
                None => {
                    tracing::warn!(path = %public_path, "Current public key missing, restoring from private key");
                    self.store.set(&public_path, jwk_value(&pair.public_key)?).await?;
                    self.invalidate_jwks();
                }
            }

            tracing::debug!(kid = ?pair.kid(), "Loaded signing key pair");
            return Ok(pair);
        }

        let pair = self.generate().await?;
        self.persist(&pair).await?;
        self.invalidate_jwks();
        tracing::info!(kid = ?pair.kid(), algorithm = %self.algorithm, "Generated signing key pair");
        Ok(pair)
    }

    async fn generate(&self) -> AuthResult<KeyPair> {
        let (code, bits) = (self.algorithm, self.modulus_bits);
        tokio::task::spawn_blocking(move || KeyPair::generate(code, bits))
            .await
            .map_err(|e| AuthError::internal(format!("Key generation task failed: {e}")))?
            .map_err(|e| AuthError::key_generation(e.to_string()))
    }

    async fn persist(&self, pair: &KeyPair) -> AuthResult<()> {
        self.store
            .set(&self.private_path(), jwk_value(&pair.private_key)?)
            .await?;
        self.store
            .set(&self.current_public_path(), jwk_value(&pair.public_key)?)
            .await?;
        Ok(())
    }

    async fn read_current_public(&self) -> AuthResult<Option<KeyHandle>> {
        let path = self.current_public_path();
        match self.store.get(&path).await? {
            Some(value) => Ok(Some(import_key(&path, value, KeyType::Public)?)),
            None => Ok(None),
        }
    }

    async fn read_archived(&self) -> AuthResult<Vec<KeyHandle>> {
        let prefix = self.public_prefix();
        let mut archived: Vec<_> = self
            .store
            .list(&prefix)
            .await?
            .into_iter()
            .filter_map(|(path, value)| {
                archive_slot(&prefix, &path).map(|slot| (slot, path, value))
            })
            .collect();
        archived.sort_by(|a, b| b.0.cmp(&a.0));

        archived
            .into_iter()
            .map(|(_, path, value)| import_key(&path, value, KeyType::Public))
            .collect()
    }
}

/// Returns `(archived_at, sub_slot)` for an archive entry under `prefix`.
///
/// `[.., ts]` is sub-slot 0; `[.., ts, n]` is sub-slot `n`.
fn archive_slot(prefix: &StorePath, path: &StorePath) -> Option<(i64, i64)> {
    let archived_at = path.get(prefix.len()).and_then(PathSegment::as_int)?;
    match path.len() - prefix.len() {
        1 => Some((archived_at, 0)),
        2 => Some((archived_at, path.last().and_then(PathSegment::as_int)?)),
        _ => None,
    }
}

fn import_key(path: &StorePath, value: Value, expected: KeyType) -> AuthResult<KeyHandle> {
    let corrupt = |message: String| AuthError::corrupt_key(path.to_string(), message);

    let jwk: Jwk = serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
    let key = jwk.to_key().map_err(|e| corrupt(e.to_string()))?;
    if key.key_type() != expected {
        return Err(corrupt(format!(
            "expected a {expected:?} key, found {:?}",
            key.key_type()
        )));
    }
    Ok(key)
}

fn jwk_value(key: &KeyHandle) -> AuthResult<Value> {
    let jwk = key
        .to_jwk()
        .map_err(|e| AuthError::internal(format!("Failed to export key: {e}")))?;
    serde_json::to_value(jwk).map_err(|e| AuthError::internal(e.to_string()))
}
