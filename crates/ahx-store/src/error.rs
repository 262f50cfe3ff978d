//! Store error types.

use std::fmt;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or an I/O operation failed.
    #[error("Store unavailable at {path}: {message}")]
    Unavailable {
        /// The path being accessed.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// A persisted entry could not be decoded.
    #[error("Corrupt entry at {path}: {message}")]
    Corrupt {
        /// The path of the corrupt entry.
        path: String,
        /// Description of why the entry is corrupt.
        message: String,
    },

    /// The value could not be encoded for storage.
    #[error("Failed to encode value for {path}: {message}")]
    Encoding {
        /// The path being written.
        path: String,
        /// Description of the encoding error.
        message: String,
    },

    /// The path is not valid for this backend.
    #[error("Invalid path: {message}")]
    InvalidPath {
        /// Description of why the path is invalid.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Creates a new `Corrupt` error.
    #[must_use]
    pub fn corrupt(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Creates a new `Encoding` error.
    #[must_use]
    pub fn encoding(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Encoding {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidPath` error.
    #[must_use]
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath {
            message: message.into(),
        }
    }

    /// Returns `true` if the persisted data itself is bad.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }

    /// Returns the store path involved, when there is one.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Unavailable { path, .. }
            | Self::Corrupt { path, .. }
            | Self::Encoding { path, .. } => Some(path),
            Self::InvalidPath { .. } => None,
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unavailable { .. } => ErrorCategory::Infrastructure,
            Self::Corrupt { .. } => ErrorCategory::Corruption,
            Self::Encoding { .. } | Self::InvalidPath { .. } => ErrorCategory::Validation,
        }
    }
}

/// Categories of store errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Backend unreachable or I/O failure.
    Infrastructure,
    /// Persisted data could not be decoded.
    Corruption,
    /// Caller supplied something the backend cannot store.
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Corruption => write!(f, "corruption"),
            Self::Validation => write!(f, "validation"),
        }
    }
}
