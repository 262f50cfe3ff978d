//! The key store trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::StoreResult;
use crate::path::StorePath;

/// Async hierarchical key-value store.
///
/// Values are JSON documents addressed by [`StorePath`]. Implementations must be
/// thread-safe (`Send + Sync`); a single `set` or `remove` must either apply
/// fully or not at all.
///
/// # Example
///
/// ```ignore
/// use ahx_store::{KeyStore, StorePath};
///
/// async fn archived_count(store: &dyn KeyStore) -> ahx_store::StoreResult<usize> {
///     let prefix = StorePath::root("ahx").child("keys").child("public");
///     Ok(store.list(&prefix).await?.len())
/// }
/// ```
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Reads the value at `path`.
    ///
    /// Returns `None` if nothing is stored there.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend cannot be read and
    /// `StoreError::Corrupt` if the stored document cannot be decoded.
    async fn get(&self, path: &StorePath) -> StoreResult<Option<Value>>;

    /// Writes `value` at `path`, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    async fn set(&self, path: &StorePath, value: Value) -> StoreResult<()>;

    /// Removes the value at `path`.
    ///
    /// Returns `true` if a value was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    async fn remove(&self, path: &StorePath) -> StoreResult<bool>;

    /// Lists every entry whose path strictly extends `prefix`, ordered by path.
    ///
    /// The entry at `prefix` itself is not included.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or an entry is corrupt.
    async fn list(&self, prefix: &StorePath) -> StoreResult<Vec<(StorePath, Value)>>;

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that KeyStore is object-safe
    fn _assert_object_safe(_: &dyn KeyStore) {}
}
