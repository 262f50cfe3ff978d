//! Process-local store backend.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::StoreResult;
use crate::path::StorePath;
use crate::traits::KeyStore;

/// In-memory key store.
///
/// Entries live in an ordered map behind a tokio `RwLock`, so `list` returns
/// descendants in path order without sorting. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<StorePath, Value>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn get(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        Ok(self.data.read().await.get(path).cloned())
    }

    async fn set(&self, path: &StorePath, value: Value) -> StoreResult<()> {
        self.data.write().await.insert(path.clone(), value);
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> StoreResult<bool> {
        Ok(self.data.write().await.remove(path).is_some())
    }

    async fn list(&self, prefix: &StorePath) -> StoreResult<Vec<(StorePath, Value)>> {
        let data = self.data.read().await;
        let entries = data
            .range((Bound::Excluded(prefix.clone()), Bound::Unbounded))
            .take_while(|(path, _)| path.is_descendant_of(prefix))
            .map(|(path, value)| (path.clone(), value.clone()))
            .collect();
        Ok(entries)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn revoked() -> StorePath {
        StorePath::root("ahx").child("revoked")
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        let path = StorePath::root("ahx").child("keys").child("private");

        assert!(store.get(&path).await.unwrap().is_none());

        store.set(&path, json!({"kty": "EC"})).await.unwrap();
        assert_eq!(store.get(&path).await.unwrap(), Some(json!({"kty": "EC"})));

        assert!(store.remove(&path).await.unwrap());
        assert!(!store.remove(&path).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_returns_only_descendants_in_order() {
        let store = MemoryStore::new();
        let exp = revoked().child("exp");
        store.set(&exp.child(200).child("b"), json!("b")).await.unwrap();
        store.set(&exp.child(100).child("a"), json!("a")).await.unwrap();
        store.set(&revoked().child("inf").child("c"), json!("c")).await.unwrap();
        store.set(&exp, json!("self")).await.unwrap();

        let listed = store.list(&exp).await.unwrap();
        let values: Vec<_> = listed.iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(values, vec![json!("a"), json!("b")]);

        assert_eq!(store.list(&revoked()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_clones_share_data() {
        let store = MemoryStore::new();
        let other = store.clone();
        let path = StorePath::root("ahx").child("x");

        store.set(&path, json!(1)).await.unwrap();
        assert_eq!(other.get(&path).await.unwrap(), Some(json!(1)));
        assert_eq!(other.len().await, 1);
    }
}
