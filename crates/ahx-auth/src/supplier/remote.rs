//! Verification keys fetched from a remote JWKS endpoint.
//!
//! Used to verify tokens issued elsewhere, such as Google ID tokens or tokens
//! signed by another AHX instance.
//!
//! # Failure semantics
//!
//! A fetch that fails (network error, timeout, non-2xx status, oversized or
//! unparseable body) is reported as [`SupplierError::Unavailable`], never as an
//! empty key set, so callers can tell "the provider is down" apart from "the
//! token is not signed by the provider".
//!
//! # Caching
//!
//! Responses are cached for `Cache-Control: max-age` seconds, bounded by
//! `max_ttl`. Without the header `default_ttl` applies; the default of zero
//! fetches on every call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use url::Url;

use super::{KeyStream, KeySupplier, SupplierError, matches_kid};
use crate::config::RemoteJwksConfig;
use crate::crypto::KeyHandle;
use crate::error::AuthError;
use crate::jwk::Jwks;
use crate::request::RequestContext;
use crate::token::JwtHeader;

/// Google's OAuth 2.0 signing keys.
pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

struct CachedKeys {
    keys: Vec<KeyHandle>,
    expires_at: Instant,
}

/// Key supplier backed by a JWKS URL.
pub struct RemoteJwks {
    url: Url,
    http_client: reqwest::Client,
    config: RemoteJwksConfig,
    cache: ArcSwapOption<CachedKeys>,
}

impl RemoteJwks {
    /// Creates a supplier for `url`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the URL scheme is not allowed,
    /// or `AuthError::Internal` if the HTTP client cannot be built.
    pub fn new(url: Url, config: RemoteJwksConfig) -> Result<Self, AuthError> {
        validate_scheme(&url, config.allow_http)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            url,
            http_client,
            config,
            cache: ArcSwapOption::empty(),
        })
    }

    /// Creates a supplier for Google's signing keys.
    ///
    /// # Errors
    ///
    /// See [`RemoteJwks::new`].
    pub fn google(config: RemoteJwksConfig) -> Result<Self, AuthError> {
        let url = Url::parse(GOOGLE_JWKS_URL)
            .map_err(|e| AuthError::configuration(format!("Invalid JWKS URL: {e}")))?;
        Self::new(url, config)
    }

    /// Returns the JWKS URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Drops any cached keys so the next call fetches.
    pub fn invalidate(&self) {
        self.cache.store(None);
        tracing::debug!(url = %self.url, "Invalidated remote JWKS cache");
    }

    /// Returns every usable signing key, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `SupplierError::Unavailable` if the keys cannot be fetched.
    pub async fn fetch_keys(&self) -> Result<Vec<KeyHandle>, SupplierError> {
        if let Some(cached) = self.cache.load_full()
            && Instant::now() < cached.expires_at
        {
            tracing::trace!(url = %self.url, "Remote JWKS cache hit");
            return Ok(cached.keys.clone());
        }

        let (keys, ttl) = self.refresh().await?;
        if !ttl.is_zero() {
            self.cache.store(Some(Arc::new(CachedKeys {
                keys: keys.clone(),
                expires_at: Instant::now() + ttl,
            })));
        }
        Ok(keys)
    }

    async fn refresh(&self) -> Result<(Vec<KeyHandle>, Duration), SupplierError> {
        let unavailable = |message: String| {
            tracing::warn!(url = %self.url, reason = %message, "Failed to fetch JWKS");
            SupplierError::unavailable(self.url.as_str(), message)
        };

        tracing::debug!(url = %self.url, "Fetching JWKS");

        let response = self
            .http_client
            .get(self.url.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP status {}", status.as_u16())));
        }

        let max_size = self.config.max_response_size;
        if let Some(len) = response.content_length()
            && len as usize > max_size
        {
            return Err(unavailable(format!(
                "Response exceeds maximum size of {max_size} bytes"
            )));
        }

        let ttl = self.parse_cache_control(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if body.len() > max_size {
            return Err(unavailable(format!(
                "Response exceeds maximum size of {max_size} bytes"
            )));
        }

        let jwks: Jwks = serde_json::from_slice(&body)
            .map_err(|e| unavailable(format!("Failed to parse JWKS: {e}")))?;

        let keys: Vec<KeyHandle> = jwks
            .keys
            .iter()
            .filter(|jwk| jwk.use_.as_deref() != Some("enc"))
            .filter_map(|jwk| match jwk.to_key() {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(
                        url = %self.url,
                        kid = ?jwk.kid,
                        error = %e,
                        "Skipping unusable JWK"
                    );
                    None
                }
            })
            .collect();

        tracing::debug!(url = %self.url, keys = keys.len(), ttl = ?ttl, "Fetched JWKS");
        Ok((keys, ttl))
    }

    /// Reads `max-age` from Cache-Control, capped at `max_ttl`.
    fn parse_cache_control(&self, headers: &reqwest::header::HeaderMap) -> Duration {
        headers
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.split(',').find_map(|directive| {
                    directive
                        .trim()
                        .strip_prefix("max-age=")
                        .and_then(|secs| secs.parse::<u64>().ok())
                })
            })
            .map_or(self.config.default_ttl, Duration::from_secs)
            .min(self.config.max_ttl)
    }
}

impl std::fmt::Debug for RemoteJwks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteJwks")
            .field("url", &self.url.as_str())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeySupplier for RemoteJwks {
    async fn keys(
        &self,
        _req: &RequestContext,
        header: Option<&JwtHeader>,
    ) -> Result<KeyStream, SupplierError> {
        let keys: Vec<_> = self
            .fetch_keys()
            .await?
            .into_iter()
            .filter(|key| matches_kid(key, header))
            .map(Ok)
            .collect();
        Ok(stream::iter(keys).boxed())
    }
}

fn validate_scheme(url: &Url, allow_http: bool) -> Result<(), AuthError> {
    match url.scheme() {
        "https" => Ok(()),
        "http" if allow_http => Ok(()),
        other => Err(AuthError::configuration(format!(
            "JWKS URL scheme '{other}' is not allowed: only HTTPS is permitted"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::AlgorithmCode;
    use crate::crypto::KeyPair;
    use futures_util::TryStreamExt;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> RemoteJwksConfig {
        RemoteJwksConfig::new()
            .with_allow_http(true)
            .with_request_timeout(Duration::from_secs(2))
    }

    fn request() -> RequestContext {
        RequestContext::from_url("https://addon.example.com/").unwrap()
    }

    fn jwks_url(server: &MockServer) -> Url {
        Url::parse(&format!("{}/jwks", server.uri())).unwrap()
    }

    fn jwks_body(pairs: &[&KeyPair]) -> serde_json::Value {
        let keys: Vec<_> = pairs
            .iter()
            .map(|p| serde_json::to_value(p.public_key.to_jwk().unwrap()).unwrap())
            .collect();
        json!({ "keys": keys })
    }

    async fn collect(supplier: &RemoteJwks, header: Option<&JwtHeader>) -> Vec<KeyHandle> {
        supplier
            .keys(&request(), header)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    #[test]
    fn test_https_required_by_default() {
        let url = Url::parse("http://idp.example.com/jwks").unwrap();
        let err = RemoteJwks::new(url, RemoteJwksConfig::default()).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_google_supplier() {
        let supplier = RemoteJwks::google(RemoteJwksConfig::default()).unwrap();
        assert_eq!(supplier.url().as_str(), GOOGLE_JWKS_URL);
    }

    #[tokio::test]
    async fn test_fetch_and_filter_by_kid() {
        let server = MockServer::start().await;
        let a = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let b = KeyPair::generate(AlgorithmCode::ES384, 0).unwrap();

        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&[&a, &b])))
            .mount(&server)
            .await;

        let supplier = RemoteJwks::new(jwks_url(&server), test_config()).unwrap();

        let all = collect(&supplier, None).await;
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(KeyHandle::is_public));

        let header = JwtHeader::new("ES384", b.kid().map(str::to_string));
        let filtered = collect(&supplier, Some(&header)).await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].kid(), b.kid());
    }

    #[tokio::test]
    async fn test_encryption_and_unknown_keys_skipped() {
        let server = MockServer::start().await;
        let pair = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let mut body = jwks_body(&[&pair]);
        let keys = body["keys"].as_array_mut().unwrap();
        keys.push(json!({"kty": "RSA", "use": "enc", "alg": "RSA-OAEP", "n": "AQAB", "e": "AQAB"}));
        keys.push(json!({"kty": "EC", "alg": "ES256K", "crv": "secp256k1", "x": "AA", "y": "AA"}));

        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let supplier = RemoteJwks::new(jwks_url(&server), test_config()).unwrap();
        let keys = collect(&supplier, None).await;
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].kid(), pair.kid());
    }

    #[tokio::test]
    async fn test_http_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let supplier = RemoteJwks::new(jwks_url(&server), test_config()).unwrap();
        let err = supplier.keys(&request(), None).await.err().unwrap();
        assert!(matches!(err, SupplierError::Unavailable { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let supplier = RemoteJwks::new(jwks_url(&server), test_config()).unwrap();
        let err = supplier.fetch_keys().await.unwrap_err();
        assert!(matches!(err, SupplierError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"keys": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = test_config().with_request_timeout(Duration::from_millis(50));
        let supplier = RemoteJwks::new(jwks_url(&server), config).unwrap();
        let err = supplier.fetch_keys().await.unwrap_err();
        assert!(matches!(err, SupplierError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_response_too_large() {
        let server = MockServer::start().await;
        let pair = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&[&pair])))
            .mount(&server)
            .await;

        let config = test_config().with_max_response_size(16);
        let supplier = RemoteJwks::new(jwks_url(&server), config).unwrap();
        let err = supplier.fetch_keys().await.unwrap_err();
        assert!(err.to_string().contains("maximum size"));
    }

    #[tokio::test]
    async fn test_no_cache_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keys": []})))
            .expect(2)
            .mount(&server)
            .await;

        let supplier = RemoteJwks::new(jwks_url(&server), test_config()).unwrap();
        supplier.fetch_keys().await.unwrap();
        supplier.fetch_keys().await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_control_max_age() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "public, max-age=300")
                    .set_body_json(json!({"keys": []})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let supplier = RemoteJwks::new(jwks_url(&server), test_config()).unwrap();
        supplier.fetch_keys().await.unwrap();
        supplier.fetch_keys().await.unwrap();

        supplier.invalidate();
        supplier.fetch_keys().await.unwrap();
    }
}
