//! # ahx-store
//!
//! Hierarchical key-value persistence for AHX key material and revocation
//! records.
//!
//! This crate defines the [`KeyStore`] trait that the key lifecycle manager and
//! revocation registry are written against, plus two backends:
//!
//! - [`MemoryStore`] - process-local, for tests and single-instance deployments
//! - [`FileStore`] - one JSON document per path under a root directory
//!
//! ## Paths
//!
//! Entries are addressed by a [`StorePath`], an ordered list of string or
//! integer segments:
//!
//! ```ignore
//! use ahx_store::StorePath;
//!
//! let path = StorePath::root("ahx").child("keys").child("public").child(1_700_000_000);
//! assert_eq!(path.to_string(), "ahx/keys/public/1700000000");
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use ahx_store::{KeyStore, MemoryStore, StorePath};
//!
//! let store = MemoryStore::new();
//! let path = StorePath::root("ahx").child("keys").child("private");
//! store.set(&path, serde_json::json!({"kty": "EC"})).await?;
//! assert!(store.get(&path).await?.is_some());
//! ```

mod error;
mod file;
mod memory;
mod path;
mod traits;

pub use error::{ErrorCategory, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use path::{PathSegment, StorePath};
pub use traits::KeyStore;

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shareable store trait object.
pub type DynKeyStore = std::sync::Arc<dyn KeyStore>;
