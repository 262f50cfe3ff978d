pub mod keys;
pub mod tokens;

use std::sync::Arc;

use ahx_auth::{KeyManager, RequestContext, RevocationRegistry};
use ahx_store::{DynKeyStore, FileStore};
use anyhow::Result;
use url::Url;

use crate::config::CliConfig;

/// Everything a command needs, opened once per invocation.
pub struct Context {
    pub config: CliConfig,
    pub keys: KeyManager,
    pub revocations: RevocationRegistry,
    pub request: RequestContext,
}

impl Context {
    pub fn open(config: &CliConfig, issuer: &Url) -> Result<Self> {
        let store: DynKeyStore = Arc::new(FileStore::new(&config.store.path));
        let keys = KeyManager::new(store.clone(), &config.auth)?;
        let revocations = RevocationRegistry::for_manager(store, &keys);

        tracing::debug!(
            store = %config.store.path.display(),
            namespace = keys.namespace(),
            "Opened key store"
        );

        Ok(Self {
            config: config.clone(),
            keys,
            revocations,
            request: RequestContext::new(issuer.clone()),
        })
    }
}
