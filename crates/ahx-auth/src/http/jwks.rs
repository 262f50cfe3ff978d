//! JWKS endpoint HTTP handler.
//!
//! Serves the current and archived public keys so other services can verify
//! tokens issued here, e.g. with [`RemoteJwks`](crate::supplier::RemoteJwks).

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::error::AuthError;
use crate::keys::KeyManager;

/// State for the JWKS endpoint.
#[derive(Clone, Debug)]
pub struct JwksState {
    /// The key manager whose public keys are published.
    pub keys: KeyManager,
}

impl JwksState {
    /// Creates a new JWKS state.
    #[must_use]
    pub fn new(keys: KeyManager) -> Self {
        Self { keys }
    }
}

/// Handler for `GET /.well-known/jwks.json`.
///
/// Returns 200 with the JWKS document and a one hour `Cache-Control`.
/// Private material is never included.
///
/// # Errors
///
/// Responds 500 if the keys cannot be read.
pub async fn jwks_handler(
    State(state): State<JwksState>,
) -> Result<impl IntoResponse, AuthError> {
    let jwks = state.keys.jwks().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(jwks),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::AlgorithmCode;
    use crate::config::AuthConfig;
    use ahx_store::{KeyStore, MemoryStore, StorePath};
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use std::sync::Arc;

    fn keys(store: &MemoryStore) -> KeyManager {
        let mut config = AuthConfig::default();
        config.signing.algorithm = AlgorithmCode::ES256;
        KeyManager::new(Arc::new(store.clone()), &config).unwrap()
    }

    #[tokio::test]
    async fn test_jwks_handler_returns_keys() {
        let store = MemoryStore::new();
        let keys = keys(&store);
        keys.init().await.unwrap();

        let response = jwks_handler(State(JwksState::new(keys.clone())))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=3600"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let published = &json["keys"];
        assert_eq!(published.as_array().unwrap().len(), 1);

        let key = &published[0];
        assert_eq!(key["kty"], "EC");
        assert_eq!(key["alg"], "ES256");
        assert_eq!(key["use"], "sig");
        assert!(key.get("d").is_none());
        assert_eq!(key["kid"].as_str(), keys.signing_key().await.unwrap().kid());
    }

    #[tokio::test]
    async fn test_jwks_handler_corrupt_key() {
        let store = MemoryStore::new();
        let path = StorePath::root("ahx")
            .child("keys")
            .child("public")
            .child("current");
        store.set(&path, serde_json::json!(42)).await.unwrap();

        let response = jwks_handler(State(JwksState::new(keys(&store))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
