//! Token issuing.

use std::time::Duration;

use crate::AuthResult;
use crate::alg::AlgorithmDescriptor;
use crate::config::{AuthConfig, DEFAULT_TOKEN_LIFETIME};
use crate::crypto::{CryptoError, KeyHandle};
use crate::encoding::{b64_encode, encode_json_part};
use crate::error::AuthError;
use crate::keys::KeyManager;
use crate::request::RequestContext;

use super::jti::generate_jti;
use super::now_seconds;
use super::types::{JwtClaims, JwtHeader, Tokens};

/// Options for [`create_token`].
#[derive(Debug, Clone)]
pub struct CreateTokenOptions {
    /// Token lifetime; `exp = iat + lifetime`.
    pub lifetime: Duration,
    /// Signing key to use instead of the manager's current key.
    pub key: Option<KeyHandle>,
}

impl Default for CreateTokenOptions {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_TOKEN_LIFETIME,
            key: None,
        }
    }
}

impl CreateTokenOptions {
    /// Creates options with the default one hour lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options with the configured token lifetime.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            lifetime: config.tokens.lifetime,
            key: None,
        }
    }

    /// Sets the token lifetime.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Signs with `key` instead of the manager's current key.
    #[must_use]
    pub fn with_key(mut self, key: KeyHandle) -> Self {
        self.key = Some(key);
        self
    }
}

/// Creates a signed token carrying `claims`.
///
/// The registered claims `iat`, `exp`, `iss` (the request host) and `jti` are
/// always set and replace any caller-supplied values.
///
/// Returns `Ok(None)` if the signing key cannot be used to sign (for example
/// a public key passed as an override); this is logged as a configuration
/// problem.
///
/// # Errors
///
/// Returns an error if the manager's signing key cannot be loaded or the
/// signature primitive fails.
pub async fn create_token(
    req: &RequestContext,
    keys: &KeyManager,
    claims: JwtClaims,
    options: &CreateTokenOptions,
) -> AuthResult<Option<String>> {
    let key = resolve_key(keys, options).await?;
    issue(req, &key, claims, options.lifetime)
}

/// Creates an access token and a refresh token bound to it.
///
/// The refresh token is the signature over the access token string, made
/// with the same key.
///
/// # Errors
///
/// See [`create_token`].
pub async fn create_tokens(
    req: &RequestContext,
    keys: &KeyManager,
    claims: JwtClaims,
    options: &CreateTokenOptions,
) -> AuthResult<Option<Tokens>> {
    let key = resolve_key(keys, options).await?;
    let Some(access_token) = issue(req, &key, claims, options.lifetime)? else {
        return Ok(None);
    };

    let Some(descriptor) = key.code().map(|code| code.descriptor()) else {
        return Ok(None);
    };
    let Some(signature) = sign(&key, &descriptor, access_token.as_bytes())? else {
        return Ok(None);
    };

    Ok(Some(Tokens {
        access_token,
        refresh_token: b64_encode(signature),
    }))
}

async fn resolve_key(keys: &KeyManager, options: &CreateTokenOptions) -> AuthResult<KeyHandle> {
    match &options.key {
        Some(key) => Ok(key.clone()),
        None => keys.signing_key().await,
    }
}

fn issue(
    req: &RequestContext,
    key: &KeyHandle,
    claims: JwtClaims,
    lifetime: Duration,
) -> AuthResult<Option<String>> {
    let Some(code) = key.code() else {
        tracing::warn!(
            kind = "config",
            reason = "unsupported algorithm",
            algorithm = ?key.algorithm(),
            "Cannot create token"
        );
        return Ok(None);
    };
    let descriptor = code.descriptor();

    let header = JwtHeader::new(code.as_str(), key.kid().map(str::to_string));

    let iat = now_seconds();
    let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
    let mut claims = claims;
    claims.insert("iat", iat);
    claims.insert("exp", iat.saturating_add(lifetime));
    claims.insert("iss", req.host());
    claims.insert("jti", generate_jti());

    let header_part = encode_json_part(&header).map_err(|e| AuthError::internal(e.to_string()))?;
    let payload_part = encode_json_part(&claims).map_err(|e| AuthError::internal(e.to_string()))?;
    let signing_input = format!("{header_part}.{payload_part}");

    let Some(signature) = sign(key, &descriptor, signing_input.as_bytes())? else {
        return Ok(None);
    };

    tracing::debug!(alg = %code, kid = ?key.kid(), jti = ?claims.jti(), "Created token");
    Ok(Some(format!("{signing_input}.{}", b64_encode(signature))))
}

/// Signs with `key`, treating a key that cannot sign as a configuration
/// problem rather than an error.
fn sign(
    key: &KeyHandle,
    descriptor: &AlgorithmDescriptor,
    data: &[u8],
) -> AuthResult<Option<Vec<u8>>> {
    match key.sign(descriptor, data) {
        Ok(signature) => Ok(Some(signature)),
        Err(
            e @ (CryptoError::UsageNotPermitted { .. }
            | CryptoError::AlgorithmMismatch { .. }
            | CryptoError::UnsupportedAlgorithm { .. }),
        ) => {
            tracing::warn!(kind = "config", reason = %e, kid = ?key.kid(), "Cannot sign token");
            Ok(None)
        }
        Err(e) => {
            tracing::error!(error = %e, kid = ?key.kid(), "Token signing failed");
            Err(AuthError::internal(format!("Token signing failed: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::AlgorithmCode;
    use crate::crypto::KeyPair;
    use crate::encoding::decode_json_part;
    use ahx_store::MemoryStore;
    use serde_json::Value;
    use std::sync::Arc;

    fn request() -> RequestContext {
        RequestContext::from_url("https://addon.example.com:8443/login").unwrap()
    }

    fn manager() -> KeyManager {
        let mut config = AuthConfig::default();
        config.signing.algorithm = AlgorithmCode::ES256;
        KeyManager::new(Arc::new(MemoryStore::new()), &config).unwrap()
    }

    fn parts(token: &str) -> (Value, Value) {
        let segments: Vec<_> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        (
            decode_json_part(segments[0]).unwrap(),
            decode_json_part(segments[1]).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_create_token_header_and_claims() {
        let keys = manager();
        let claims = JwtClaims::new().with("sub", "user-1").with("iss", "spoofed");

        let token = create_token(&request(), &keys, claims, &CreateTokenOptions::new())
            .await
            .unwrap()
            .unwrap();
        let (header, payload) = parts(&token);

        let kid = keys.signing_key().await.unwrap().kid().map(str::to_string);
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["typ"], "JWT");
        assert_eq!(header["kid"].as_str().map(str::to_string), kid);

        assert_eq!(payload["sub"], "user-1");
        assert_eq!(payload["iss"], "addon.example.com:8443");
        let iat = payload["iat"].as_i64().unwrap();
        assert_eq!(payload["exp"].as_i64().unwrap(), iat + 3600);
        assert_eq!(payload["jti"].as_str().unwrap().len(), 24);
    }

    #[tokio::test]
    async fn test_custom_lifetime_and_key() {
        let keys = manager();
        let pair = KeyPair::generate(AlgorithmCode::ES384, 0).unwrap();
        let options = CreateTokenOptions::new()
            .with_lifetime(Duration::from_secs(60))
            .with_key(pair.private_key.clone());

        let token = create_token(&request(), &keys, JwtClaims::new(), &options)
            .await
            .unwrap()
            .unwrap();
        let (header, payload) = parts(&token);
        assert_eq!(header["alg"], "ES384");
        assert_eq!(header["kid"].as_str(), pair.kid());
        assert_eq!(
            payload["exp"].as_i64().unwrap() - payload["iat"].as_i64().unwrap(),
            60
        );
    }

    #[tokio::test]
    async fn test_hmac_override_key() {
        let keys = manager();
        let secret = KeyHandle::hmac_secret(AlgorithmCode::HS256, b"secret".to_vec(), None).unwrap();
        let options = CreateTokenOptions::new().with_key(secret);

        let token = create_token(&request(), &keys, JwtClaims::new(), &options)
            .await
            .unwrap()
            .unwrap();
        let (header, _) = parts(&token);
        assert_eq!(header["alg"], "HS256");
        assert!(header.get("kid").is_none());
    }

    #[tokio::test]
    async fn test_public_key_cannot_sign() {
        let keys = manager();
        let pair = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let options = CreateTokenOptions::new().with_key(pair.public_key.clone());

        let token = create_token(&request(), &keys, JwtClaims::new(), &options)
            .await
            .unwrap();
        assert!(token.is_none());

        let tokens = create_tokens(&request(), &keys, JwtClaims::new(), &options)
            .await
            .unwrap();
        assert!(tokens.is_none());
    }

    #[tokio::test]
    async fn test_create_tokens() {
        let keys = manager();
        let tokens = create_tokens(&request(), &keys, JwtClaims::new(), &CreateTokenOptions::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(tokens.access_token.split('.').count(), 3);
        assert!(!tokens.refresh_token.is_empty());
        assert!(!tokens.refresh_token.contains('.'));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = AuthConfig::default();
        config.tokens.lifetime = Duration::from_secs(900);
        let options = CreateTokenOptions::from_config(&config);
        assert_eq!(options.lifetime, Duration::from_secs(900));
        assert!(options.key.is_none());
    }
}
