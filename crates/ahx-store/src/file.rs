//! Filesystem store backend.
//!
//! Each path maps to a directory; the value lives in a `_value.json` file
//! inside it. Segment directories are named `s.<escaped>` for strings and
//! `i.<n>` for integers so that both kinds round-trip through `list`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::StoreResult;
use crate::error::StoreError;
use crate::path::{PathSegment, StorePath};
use crate::traits::KeyStore;

const VALUE_FILE: &str = "_value.json";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Store backed by a directory tree of JSON documents.
///
/// Writes go to a temporary file that is renamed into place, so a reader
/// never observes a partially written value.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, path: &StorePath) -> StoreResult<PathBuf> {
        if path.is_empty() {
            return Err(StoreError::invalid_path("path has no segments"));
        }
        let mut dir = self.root.clone();
        for segment in path.segments() {
            dir.push(encode_segment(segment));
        }
        Ok(dir)
    }

    async fn read_value(path: &StorePath, file: &Path) -> StoreResult<Option<Value>> {
        match tokio::fs::read(file).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::corrupt(path, e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::unavailable(path, e.to_string())),
        }
    }

    async fn write_value(path: &StorePath, dir: &Path, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        let tmp = dir.join(format!(
            ".{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, dir.join(VALUE_FILE)).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                tracing::debug!(
                    path = %path,
                    tmp = %tmp.display(),
                    error = %cleanup,
                    "Failed to remove temporary store file"
                );
            }
            return Err(e);
        }
        tracing::trace!(path = %path, "Wrote store entry");
        Ok(())
    }
}

#[async_trait]
impl KeyStore for FileStore {
    async fn get(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        let file = self.dir_for(path)?.join(VALUE_FILE);
        Self::read_value(path, &file).await
    }

    async fn set(&self, path: &StorePath, value: Value) -> StoreResult<()> {
        let dir = self.dir_for(path)?;
        let bytes =
            serde_json::to_vec(&value).map_err(|e| StoreError::encoding(path, e.to_string()))?;

        // A concurrent remove may prune the directory between create and write.
        match Self::write_value(path, &dir, &bytes).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Self::write_value(path, &dir, &bytes)
                .await
                .map_err(|e| StoreError::unavailable(path, e.to_string())),
            other => other.map_err(|e| StoreError::unavailable(path, e.to_string())),
        }
    }

    async fn remove(&self, path: &StorePath) -> StoreResult<bool> {
        let dir = self.dir_for(path)?;
        match tokio::fs::remove_file(dir.join(VALUE_FILE)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StoreError::unavailable(path, e.to_string())),
        }

        // Prune now-empty directories up to the root; remove_dir fails on
        // anything non-empty, which ends the walk.
        let mut current = Some(dir.as_path());
        while let Some(d) = current {
            if d == self.root || tokio::fs::remove_dir(d).await.is_err() {
                break;
            }
            current = d.parent();
        }
        Ok(true)
    }

    async fn list(&self, prefix: &StorePath) -> StoreResult<Vec<(StorePath, Value)>> {
        let base = self.dir_for(prefix)?;
        let mut entries = Vec::new();
        let mut pending = vec![(base, prefix.clone())];

        while let Some((dir, path)) = pending.pop() {
            let mut read_dir = match tokio::fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::unavailable(&path, e.to_string())),
            };

            loop {
                let entry = match read_dir.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => return Err(StoreError::unavailable(&path, e.to_string())),
                };
                let name = entry.file_name();
                let Some(segment) = name.to_str().and_then(decode_segment) else {
                    continue;
                };
                let child_dir = entry.path();
                let child = path.child(segment);

                if let Some(value) = Self::read_value(&child, &child_dir.join(VALUE_FILE)).await? {
                    entries.push((child.clone(), value));
                }
                pending.push((child_dir, child));
            }
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        tracing::trace!(prefix = %prefix, count = entries.len(), "Listed store entries");
        Ok(entries)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

fn encode_segment(segment: &PathSegment) -> String {
    match segment {
        PathSegment::Int(n) => format!("i.{n}"),
        PathSegment::Str(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push_str("s.");
            for b in s.bytes() {
                if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                    out.push(b as char);
                } else {
                    out.push_str(&format!("%{b:02X}"));
                }
            }
            out
        }
    }
}

fn decode_segment(name: &str) -> Option<PathSegment> {
    if let Some(n) = name.strip_prefix("i.") {
        return n.parse().ok().map(PathSegment::Int);
    }
    let escaped = name.strip_prefix("s.")?;
    let mut bytes = Vec::with_capacity(escaped.len());
    let mut iter = escaped.bytes();
    while let Some(b) = iter.next() {
        if b == b'%' {
            let hi = iter.next()?;
            let lo = iter.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(b);
        }
    }
    String::from_utf8(bytes).ok().map(PathSegment::Str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_segment_encoding_round_trip() {
        for segment in [
            PathSegment::from("current"),
            PathSegment::from("a/b c.%"),
            PathSegment::from(-5),
            PathSegment::from(1_700_000_000),
        ] {
            let encoded = encode_segment(&segment);
            assert!(!encoded.contains('/'));
            assert_eq!(decode_segment(&encoded), Some(segment));
        }
        assert_eq!(decode_segment(VALUE_FILE), None);
        assert_eq!(decode_segment(".123.0.tmp"), None);
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let path = StorePath::root("ahx").child("keys").child("private");

        assert!(store.get(&path).await.unwrap().is_none());
        store.set(&path, json!({"kty": "RSA"})).await.unwrap();
        assert_eq!(store.get(&path).await.unwrap(), Some(json!({"kty": "RSA"})));

        store.set(&path, json!({"kty": "EC"})).await.unwrap();
        assert_eq!(store.get(&path).await.unwrap(), Some(json!({"kty": "EC"})));

        assert!(store.remove(&path).await.unwrap());
        assert!(!store.remove(&path).await.unwrap());
        assert!(store.get(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_descendants_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let public = StorePath::root("ahx").child("keys").child("public");

        store.set(&public.child("current"), json!("c")).await.unwrap();
        store.set(&public.child(20), json!(20)).await.unwrap();
        store.set(&public.child(3), json!(3)).await.unwrap();
        store.set(&public, json!("self")).await.unwrap();

        let listed = store.list(&public).await.unwrap();
        let values: Vec<_> = listed.into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![json!(3), json!(20), json!("c")]);

        let missing = StorePath::root("nothing");
        assert!(store.list(&missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let path = StorePath::root("ahx").child("keys").child("private");

        let dir = store.dir_for(&path).unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(VALUE_FILE), b"{not json").unwrap();

        let err = store.get(&path).await.unwrap_err();
        assert!(err.is_corrupt());
        assert_eq!(err.path(), Some("ahx/keys/private"));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let path = StorePath::root("ahx").child("keys").child("private");

        // A non-empty directory where the value file belongs makes the rename fail.
        let dir = store.dir_for(&path).unwrap();
        std::fs::create_dir_all(dir.join(VALUE_FILE)).unwrap();
        std::fs::write(dir.join(VALUE_FILE).join("blocker"), b"x").unwrap();

        let err = store.set(&path, json!({"kty": "EC"})).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));

        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_value_and_children_coexist() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let public = StorePath::root("ahx").child("keys").child("public");
        let slot = public.child(100);
        let sub_slot = slot.child(1);

        store.set(&slot, json!("first")).await.unwrap();
        store.set(&sub_slot, json!("second")).await.unwrap();

        let listed = store.list(&public).await.unwrap();
        assert_eq!(
            listed,
            vec![(slot.clone(), json!("first")), (sub_slot.clone(), json!("second"))]
        );

        // Removing the parent value keeps the child entry.
        assert!(store.remove(&slot).await.unwrap());
        assert_eq!(store.get(&sub_slot).await.unwrap(), Some(json!("second")));
        assert!(store.remove(&sub_slot).await.unwrap());
        assert!(store.list(&public).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_path_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());

        let err = store.get(&StorePath::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath { .. }));
    }
}
