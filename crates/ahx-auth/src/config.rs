//! Token lifecycle configuration.
//!
//! All sections default to production values, so an empty config file is
//! valid. Durations use humantime syntax (`"14d"`, `"1h"`, `"10s"`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::alg::AlgorithmCode;

/// Environment variable overriding the archived public key retention, in seconds.
pub const MAX_ARCHIVED_AGE_ENV: &str = "PUBLIC_KEY_MAX_ARCHIVED_AGE";

/// Default retention for archived public keys (14 days).
pub const DEFAULT_MAX_ARCHIVED_AGE: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Default token lifetime (1 hour).
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Root configuration.
///
/// # Example (TOML)
///
/// ```toml
/// namespace = "ahx"
///
/// [signing]
/// algorithm = "PS256"
/// modulus_bits = 4096
///
/// [keys]
/// max_archived_age = "14d"
///
/// [tokens]
/// lifetime = "1h"
///
/// [remote_jwks]
/// request_timeout = "10s"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// First segment of every store path.
    pub namespace: String,

    /// Signing key generation.
    pub signing: SigningConfig,

    /// Key retention.
    pub keys: KeysConfig,

    /// Token issuing defaults.
    pub tokens: TokensConfig,

    /// Remote JWKS fetching.
    pub remote_jwks: RemoteJwksConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            namespace: "ahx".to_string(),
            signing: SigningConfig::default(),
            keys: KeysConfig::default(),
            tokens: TokensConfig::default(),
            remote_jwks: RemoteJwksConfig::default(),
        }
    }
}

/// Signing key generation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Algorithm for generated key pairs. Must be asymmetric.
    pub algorithm: AlgorithmCode,

    /// RSA modulus size in bits. Ignored for EC algorithms.
    pub modulus_bits: usize,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmCode::PS256,
            modulus_bits: 4096,
        }
    }
}

/// Key retention.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeysConfig {
    /// How long an archived public key stays verifiable after rotation.
    #[serde(with = "humantime_serde")]
    pub max_archived_age: Duration,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            max_archived_age: DEFAULT_MAX_ARCHIVED_AGE,
        }
    }
}

/// Token issuing defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokensConfig {
    /// Lifetime of issued tokens (`exp - iat`).
    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }
}

/// Remote JWKS fetching.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteJwksConfig {
    /// HTTP request timeout (default: 10 seconds).
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Maximum response size in bytes (default: 1 MB).
    pub max_response_size: usize,

    /// Cache lifetime when the response has no `Cache-Control: max-age`.
    /// Zero disables caching.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Upper bound on the cache lifetime.
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,

    /// Whether to allow HTTP (non-HTTPS) JWKS URLs.
    /// This should only be enabled for testing.
    pub allow_http: bool,
}

impl Default for RemoteJwksConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_response_size: 1024 * 1024,
            default_ttl: Duration::ZERO,
            max_ttl: Duration::from_secs(24 * 60 * 60),
            allow_http: false,
        }
    }
}

impl RemoteJwksConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum response size.
    #[must_use]
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Sets the default cache lifetime.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the maximum cache lifetime.
    #[must_use]
    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }

    /// Allows HTTP (non-HTTPS) JWKS URLs.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The namespace is empty
    /// - The signing algorithm is symmetric
    /// - The RSA modulus is outside 2048..=16384 bits
    /// - The token lifetime or request timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::InvalidValue(
                "namespace cannot be empty".to_string(),
            ));
        }

        if !self.signing.algorithm.is_asymmetric() {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid signing algorithm: '{}'. Generated keys must be RSA or EC",
                self.signing.algorithm
            )));
        }

        if self.signing.algorithm.descriptor().family.is_rsa()
            && !(2048..=16384).contains(&self.signing.modulus_bits)
        {
            return Err(ConfigError::InvalidValue(format!(
                "modulus_bits must be between 2048 and 16384, got {}",
                self.signing.modulus_bits
            )));
        }

        if self.tokens.lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "token lifetime must be > 0".to_string(),
            ));
        }

        if self.remote_jwks.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "remote_jwks request_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Applies overrides from the process environment.
    ///
    /// Currently only `PUBLIC_KEY_MAX_ARCHIVED_AGE`.
    pub fn apply_env_overrides(&mut self) {
        if let Some(age) = env_max_archived_age() {
            self.keys.max_archived_age = age;
        }
    }
}

/// Reads `PUBLIC_KEY_MAX_ARCHIVED_AGE` from the environment.
///
/// Returns `None` when the variable is unset, not numeric, or not positive.
#[must_use]
pub fn env_max_archived_age() -> Option<Duration> {
    std::env::var(MAX_ARCHIVED_AGE_ENV)
        .ok()
        .and_then(|value| parse_max_archived_age(&value))
}

/// Parses a retention override in seconds.
///
/// Like `parseInt`, leading digits are taken and trailing text ignored
/// (`"3600s"` is an hour). Zero, negative and non-numeric values yield `None`.
#[must_use]
pub fn parse_max_archived_age(value: &str) -> Option<Duration> {
    let value = value.trim_start();
    let digits = value.strip_prefix('+').unwrap_or(value);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.namespace, "ahx");
        assert_eq!(config.signing.algorithm, AlgorithmCode::PS256);
        assert_eq!(config.signing.modulus_bits, 4096);
        assert_eq!(config.keys.max_archived_age, Duration::from_secs(1_209_600));
        assert_eq!(config.tokens.lifetime, Duration::from_secs(3600));
        assert_eq!(config.remote_jwks.request_timeout, Duration::from_secs(10));
        assert_eq!(config.remote_jwks.max_response_size, 1024 * 1024);
        assert!(!config.remote_jwks.allow_http);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(AuthConfig::default().validate().is_ok());
    }

    #[test]
    fn test_hmac_signing_fails_validation() {
        let mut config = AuthConfig::default();
        config.signing.algorithm = AlgorithmCode::HS256;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signing algorithm"));
    }

    #[test]
    fn test_modulus_bits_validation() {
        let mut config = AuthConfig::default();
        config.signing.modulus_bits = 1024;
        assert!(config.validate().is_err());

        // EC algorithms ignore the modulus.
        config.signing.algorithm = AlgorithmCode::ES256;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_namespace_fails_validation() {
        let mut config = AuthConfig::default();
        config.namespace = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: AuthConfig = serde_json::from_value(serde_json::json!({
            "namespace": "tenant",
            "signing": {"algorithm": "ES384"},
            "keys": {"max_archived_age": "2d"}
        }))
        .unwrap();

        assert_eq!(config.namespace, "tenant");
        assert_eq!(config.signing.algorithm, AlgorithmCode::ES384);
        assert_eq!(config.signing.modulus_bits, 4096);
        assert_eq!(config.keys.max_archived_age, Duration::from_secs(172_800));
        assert_eq!(config.tokens.lifetime, DEFAULT_TOKEN_LIFETIME);
    }

    #[test]
    fn test_parse_max_archived_age() {
        assert_eq!(parse_max_archived_age("3600"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_max_archived_age(" 60s"), Some(Duration::from_secs(60)));
        assert_eq!(parse_max_archived_age("+5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_max_archived_age("0"), None);
        assert_eq!(parse_max_archived_age("abc"), None);
        assert_eq!(parse_max_archived_age(""), None);
        assert_eq!(parse_max_archived_age("-10"), None);
    }

    #[test]
    fn test_remote_jwks_builder() {
        let config = RemoteJwksConfig::new()
            .with_request_timeout(Duration::from_secs(5))
            .with_max_response_size(512 * 1024)
            .with_default_ttl(Duration::from_secs(300))
            .with_max_ttl(Duration::from_secs(600))
            .with_allow_http(true);

        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_response_size, 512 * 1024);
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.max_ttl, Duration::from_secs(600));
        assert!(config.allow_http);
    }
}
