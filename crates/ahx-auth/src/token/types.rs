//! Token header, claims and pair types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Largest integer a JSON number can represent exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Compact token header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    /// Algorithm code, e.g. `"PS256"`.
    pub alg: String,

    /// Token type. Only `"JWT"` is accepted by the verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Id of the signing key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl JwtHeader {
    /// Creates a `typ: "JWT"` header.
    #[must_use]
    pub fn new(alg: impl Into<String>, kid: Option<String>) -> Self {
        Self {
            alg: alg.into(),
            typ: Some("JWT".to_string()),
            kid,
        }
    }
}

/// Token payload: an arbitrary JSON object with accessors for the registered
/// claims.
///
/// Registered claims are read leniently: a claim of the wrong JSON type is
/// treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JwtClaims(Map<String, Value>);

impl JwtClaims {
    /// Creates an empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a claim, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Sets a claim, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Returns a claim.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns a claim if it is a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Returns a claim if it is a finite number.
    #[must_use]
    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.0
            .get(name)
            .and_then(Value::as_f64)
            .filter(|n| n.is_finite())
    }

    /// Issuer.
    #[must_use]
    pub fn iss(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// Subject.
    #[must_use]
    pub fn sub(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Token id.
    #[must_use]
    pub fn jti(&self) -> Option<&str> {
        self.get_str("jti").filter(|jti| !jti.is_empty())
    }

    /// Issued-at time, in seconds since the epoch.
    #[must_use]
    pub fn iat(&self) -> Option<f64> {
        self.get_number("iat")
    }

    /// Expiry time, in seconds since the epoch.
    #[must_use]
    pub fn exp(&self) -> Option<f64> {
        self.get_number("exp")
    }

    /// Not-before time, in seconds since the epoch.
    #[must_use]
    pub fn nbf(&self) -> Option<f64> {
        self.get_number("nbf")
    }

    /// Returns `exp` when it is a positive integer no larger than
    /// [`MAX_SAFE_INTEGER`].
    #[must_use]
    pub fn exp_safe_integer(&self) -> Option<i64> {
        let exp = self.0.get("exp")?;
        let value = match exp.as_i64() {
            Some(n) => n,
            None => {
                let f = exp.as_f64()?;
                if f.fract() != 0.0 || !f.is_finite() || f.abs() > MAX_SAFE_INTEGER as f64 {
                    return None;
                }
                f as i64
            }
        };
        (value > 0 && value <= MAX_SAFE_INTEGER).then_some(value)
    }

    /// Deserializes the claims into a typed view.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims do not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(Value::Object(self.0.clone()))
    }

    /// Returns the underlying JSON object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the claims and returns the JSON object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for JwtClaims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// An access token and the refresh token bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// The signed access token.
    pub access_token: String,
    /// Signature over the access token string, base64url encoded.
    pub refresh_token: String,
}

/// Whether time-based claims are enforced during verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Enforce `exp` and `nbf`.
    #[default]
    Access,
    /// Skip time checks; used when an expired access token is presented
    /// together with its refresh token.
    Refresh,
}
