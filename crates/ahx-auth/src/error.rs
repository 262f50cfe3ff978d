//! Token lifecycle error types.
//!
//! Expected negatives (bad signature, expired token, unsupported algorithm)
//! are not errors: the token operations report them as `Ok(None)` or
//! `Ok(false)`. The variants here are infrastructure and configuration
//! failures that a caller should surface as a server-side problem.

use std::fmt;

use ahx_store::StoreError;

/// Errors that can occur while issuing, verifying or managing tokens and keys.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The key store could not be read or written.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Persisted key material could not be decoded or imported.
    #[error("Corrupt key material at {path}: {message}")]
    CorruptKey {
        /// Store path of the offending entry.
        path: String,
        /// Description of what is wrong with it.
        message: String,
    },

    /// A key supplier could not produce keys (e.g. a remote JWKS fetch failed).
    #[error("Key source unavailable ({location}): {message}")]
    KeySourceUnavailable {
        /// Where the keys were being fetched from.
        location: String,
        /// Description of the failure.
        message: String,
    },

    /// A new key pair could not be generated.
    #[error("Key generation failed: {message}")]
    KeyGeneration {
        /// Description of the failure.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `CorruptKey` error.
    #[must_use]
    pub fn corrupt_key(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptKey {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `KeySourceUnavailable` error.
    #[must_use]
    pub fn key_source_unavailable(
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::KeySourceUnavailable {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Creates a new `KeyGeneration` error.
    #[must_use]
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error should map to a 5xx response.
    ///
    /// Every variant is a server-side failure: rejections of bad tokens are
    /// reported as `Ok(None)` and never reach this type.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        true
    }

    /// Returns `true` if retrying the operation later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::KeySourceUnavailable { .. }
        )
    }

    /// Returns `true` if this error indicates an upstream dependency failed
    /// (a 502 rather than a 500).
    #[must_use]
    pub fn is_upstream_error(&self) -> bool {
        matches!(self, Self::KeySourceUnavailable { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage { .. } | Self::KeySourceUnavailable { .. } => {
                ErrorCategory::Infrastructure
            }
            Self::CorruptKey { .. } | Self::KeyGeneration { .. } => ErrorCategory::KeyMaterial,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { path, message } => Self::CorruptKey { path, message },
            other => Self::storage(other.to_string()),
        }
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Store or network failures.
    Infrastructure,
    /// Key material that cannot be generated or loaded.
    KeyMaterial,
    /// Configuration problems.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::KeyMaterial => write!(f, "key_material"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::corrupt_key("ahx/keys/private", "missing d");
        assert_eq!(
            err.to_string(),
            "Corrupt key material at ahx/keys/private: missing d"
        );

        let err = AuthError::key_source_unavailable("https://example.com/jwks", "HTTP 503");
        assert_eq!(
            err.to_string(),
            "Key source unavailable (https://example.com/jwks): HTTP 503"
        );
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::key_source_unavailable("remote", "timeout");
        assert!(err.is_server_error());
        assert!(err.is_transient());
        assert!(err.is_upstream_error());

        let err = AuthError::corrupt_key("ahx/keys/private", "bad");
        assert!(err.is_server_error());
        assert!(!err.is_transient());
        assert!(!err.is_upstream_error());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AuthError::storage("x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            AuthError::key_generation("x").category(),
            ErrorCategory::KeyMaterial
        );
        assert_eq!(
            AuthError::configuration("x").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(AuthError::internal("x").category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_from_store_error() {
        let err: AuthError = StoreError::corrupt("ahx/keys/private", "bad json").into();
        assert!(matches!(err, AuthError::CorruptKey { ref path, .. } if path == "ahx/keys/private"));

        let err: AuthError = StoreError::unavailable("ahx/keys", "denied").into();
        assert!(matches!(err, AuthError::Storage { .. }));
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::KeyMaterial.to_string(), "key_material");
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
