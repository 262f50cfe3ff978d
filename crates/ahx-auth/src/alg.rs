//! Algorithm registry.
//!
//! Maps between the compact JWS algorithm codes that appear in token headers
//! (`ES256`, `PS512`, ...) and the algorithm parameters a key handle carries
//! (family, hash, curve, salt length).
//!
//! Both directions are total and return `Option`; an unknown name or a key
//! whose parameters do not name one of the twelve supported codes yields
//! `None`.
//!
//! | Code  | Family              | Hash    | Curve | Salt |
//! |-------|---------------------|---------|-------|------|
//! | ES256 | ECDSA               | SHA-256 | P-256 |      |
//! | ES384 | ECDSA               | SHA-384 | P-384 |      |
//! | ES512 | ECDSA               | SHA-512 | P-521 |      |
//! | HS256 | HMAC                | SHA-256 |       |      |
//! | HS384 | HMAC                | SHA-384 |       |      |
//! | HS512 | HMAC                | SHA-512 |       |      |
//! | PS256 | RSA-PSS             | SHA-256 |       | 32   |
//! | PS384 | RSA-PSS             | SHA-384 |       | 48   |
//! | PS512 | RSA-PSS             | SHA-512 |       | 64   |
//! | RS256 | RSASSA-PKCS1-v1_5   | SHA-256 |       |      |
//! | RS384 | RSASSA-PKCS1-v1_5   | SHA-384 |       |      |
//! | RS512 | RSASSA-PKCS1-v1_5   | SHA-512 |       |      |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A supported JWS algorithm code.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmCode {
    /// ECDSA using P-256 and SHA-256.
    ES256,
    /// ECDSA using P-384 and SHA-384.
    ES384,
    /// ECDSA using P-521 and SHA-512.
    ES512,
    /// HMAC using SHA-256.
    HS256,
    /// HMAC using SHA-384.
    HS384,
    /// HMAC using SHA-512.
    HS512,
    /// RSASSA-PSS using SHA-256.
    PS256,
    /// RSASSA-PSS using SHA-384.
    PS384,
    /// RSASSA-PSS using SHA-512.
    PS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256.
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384.
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512.
    RS512,
}

impl AlgorithmCode {
    /// Every supported code.
    pub const ALL: [Self; 12] = [
        Self::ES256,
        Self::ES384,
        Self::ES512,
        Self::HS256,
        Self::HS384,
        Self::HS512,
        Self::PS256,
        Self::PS384,
        Self::PS512,
        Self::RS256,
        Self::RS384,
        Self::RS512,
    ];

    /// Returns the header name for this code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
        }
    }

    /// Looks up a code by its header name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_str() == name)
    }

    /// Returns the parameters for this code.
    #[must_use]
    pub fn descriptor(self) -> AlgorithmDescriptor {
        use HashAlgorithm::{Sha256, Sha384, Sha512};
        use KeyFamily::{Ecdsa, Hmac, RsaPkcs1v15, RsaPss};

        let (family, hash, named_curve, salt_length) = match self {
            Self::ES256 => (Ecdsa, Sha256, Some(NamedCurve::P256), None),
            Self::ES384 => (Ecdsa, Sha384, Some(NamedCurve::P384), None),
            Self::ES512 => (Ecdsa, Sha512, Some(NamedCurve::P521), None),
            Self::HS256 => (Hmac, Sha256, None, None),
            Self::HS384 => (Hmac, Sha384, None, None),
            Self::HS512 => (Hmac, Sha512, None, None),
            Self::PS256 => (RsaPss, Sha256, None, Some(32)),
            Self::PS384 => (RsaPss, Sha384, None, Some(48)),
            Self::PS512 => (RsaPss, Sha512, None, Some(64)),
            Self::RS256 => (RsaPkcs1v15, Sha256, None, None),
            Self::RS384 => (RsaPkcs1v15, Sha384, None, None),
            Self::RS512 => (RsaPkcs1v15, Sha512, None, None),
        };

        AlgorithmDescriptor {
            family,
            hash,
            named_curve,
            salt_length,
        }
    }

    /// Returns `true` if keys for this code are asymmetric.
    #[must_use]
    pub fn is_asymmetric(&self) -> bool {
        !matches!(self, Self::HS256 | Self::HS384 | Self::HS512)
    }
}

impl fmt::Display for AlgorithmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlgorithmCode {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}

/// Error returned when parsing an unsupported algorithm name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

/// Signature algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    /// ECDSA.
    Ecdsa,
    /// HMAC.
    Hmac,
    /// RSASSA-PKCS1-v1_5.
    RsaPkcs1v15,
    /// RSASSA-PSS.
    RsaPss,
}

impl KeyFamily {
    /// Returns the family name (`"ECDSA"`, `"RSA-PSS"`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ecdsa => "ECDSA",
            Self::Hmac => "HMAC",
            Self::RsaPkcs1v15 => "RSASSA-PKCS1-v1_5",
            Self::RsaPss => "RSA-PSS",
        }
    }

    /// Returns the two-letter code prefix.
    #[must_use]
    pub fn code_prefix(&self) -> &'static str {
        match self {
            Self::Ecdsa => "ES",
            Self::Hmac => "HS",
            Self::RsaPkcs1v15 => "RS",
            Self::RsaPss => "PS",
        }
    }

    /// Returns `true` for the RSA families.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RsaPkcs1v15 | Self::RsaPss)
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Hash function bound to a key or algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-1. Recognised on keys but not usable for any supported code.
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Returns the hash name (`"SHA-256"`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Returns the size label used in algorithm codes (`"256"` for SHA-256).
    #[must_use]
    pub fn size_label(&self) -> &'static str {
        match self {
            Self::Sha1 => "1",
            Self::Sha256 => "256",
            Self::Sha384 => "384",
            Self::Sha512 => "512",
        }
    }
}

/// Elliptic curve of an ECDSA key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedCurve {
    /// NIST P-256.
    P256,
    /// NIST P-384.
    P384,
    /// NIST P-521.
    P521,
}

impl NamedCurve {
    /// Returns the curve name as it appears in JWKs (`"P-256"`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// Looks up a curve by its JWK name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(Self::P256),
            "P-384" => Some(Self::P384),
            "P-521" => Some(Self::P521),
            _ => None,
        }
    }

    /// Returns the size label used in algorithm codes.
    ///
    /// P-521 is paired with SHA-512, so its label is `"512"`.
    #[must_use]
    pub fn size_label(&self) -> &'static str {
        match self {
            Self::P256 => "256",
            Self::P384 => "384",
            Self::P521 => "512",
        }
    }

    /// Returns the size in bytes of a single signature component (`r` or `s`).
    #[must_use]
    pub fn component_len(&self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

/// Parameters for signing or verifying with one algorithm code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmDescriptor {
    /// Algorithm family.
    pub family: KeyFamily,
    /// Hash function.
    pub hash: HashAlgorithm,
    /// Curve, for ECDSA.
    pub named_curve: Option<NamedCurve>,
    /// Salt length in bytes, for RSA-PSS.
    pub salt_length: Option<usize>,
}

/// The algorithm a key handle is bound to.
///
/// RSA and HMAC keys carry their hash; EC keys carry only their curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAlgorithm {
    /// Algorithm family.
    pub family: KeyFamily,
    /// Hash bound to the key, if any.
    pub hash: Option<HashAlgorithm>,
    /// Curve, for EC keys.
    pub named_curve: Option<NamedCurve>,
}

impl From<AlgorithmDescriptor> for KeyAlgorithm {
    fn from(descriptor: AlgorithmDescriptor) -> Self {
        match descriptor.family {
            KeyFamily::Ecdsa => Self {
                family: descriptor.family,
                hash: None,
                named_curve: descriptor.named_curve,
            },
            _ => Self {
                family: descriptor.family,
                hash: Some(descriptor.hash),
                named_curve: None,
            },
        }
    }
}

/// Resolves the algorithm code for a key.
///
/// The size label comes from the key's hash when it has one, otherwise from
/// its curve. Returns `None` if the combination is not a supported code
/// (e.g. an RSA key bound to SHA-1).
#[must_use]
pub fn code_for_key(key: &KeyAlgorithm) -> Option<AlgorithmCode> {
    let size = key
        .hash
        .map(|hash| hash.size_label())
        .or_else(|| key.named_curve.map(|curve| curve.size_label()))?;

    AlgorithmCode::from_name(&format!("{}{size}", key.family.code_prefix()))
}

/// Returns the parameters for an algorithm code.
///
/// Always `Some` for a parsed code; use [`descriptor_for_name`] for raw header
/// values.
#[must_use]
pub fn descriptor_for_code(code: AlgorithmCode) -> Option<AlgorithmDescriptor> {
    Some(code.descriptor())
}

/// Returns the parameters for an algorithm name, or `None` if unsupported.
#[must_use]
pub fn descriptor_for_name(name: &str) -> Option<AlgorithmDescriptor> {
    AlgorithmCode::from_name(name).map(AlgorithmCode::descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_codes_round_trip() {
        for code in AlgorithmCode::ALL {
            let descriptor = descriptor_for_code(code).unwrap();
            let key = KeyAlgorithm::from(descriptor);
            assert_eq!(code_for_key(&key), Some(code), "round trip for {code}");
        }
    }

    #[test]
    fn test_p521_maps_to_es512() {
        let key = KeyAlgorithm {
            family: KeyFamily::Ecdsa,
            hash: None,
            named_curve: Some(NamedCurve::P521),
        };
        assert_eq!(code_for_key(&key), Some(AlgorithmCode::ES512));
        assert!(AlgorithmCode::from_name("ES521").is_none());
    }

    #[test]
    fn test_sha1_rsa_has_no_code() {
        let key = KeyAlgorithm {
            family: KeyFamily::RsaPkcs1v15,
            hash: Some(HashAlgorithm::Sha1),
            named_curve: None,
        };
        assert_eq!(code_for_key(&key), None);
    }

    #[test]
    fn test_key_without_hash_or_curve() {
        let key = KeyAlgorithm {
            family: KeyFamily::Hmac,
            hash: None,
            named_curve: None,
        };
        assert_eq!(code_for_key(&key), None);
    }

    #[test]
    fn test_descriptor_for_name() {
        let descriptor = descriptor_for_name("PS384").unwrap();
        assert_eq!(descriptor.family, KeyFamily::RsaPss);
        assert_eq!(descriptor.hash, HashAlgorithm::Sha384);
        assert_eq!(descriptor.salt_length, Some(48));

        let descriptor = descriptor_for_name("ES512").unwrap();
        assert_eq!(descriptor.named_curve, Some(NamedCurve::P521));

        assert!(descriptor_for_name("none").is_none());
        assert!(descriptor_for_name("EdDSA").is_none());
        assert!(descriptor_for_name("es256").is_none());
    }

    #[test]
    fn test_code_parse_and_display() {
        assert_eq!("RS256".parse::<AlgorithmCode>(), Ok(AlgorithmCode::RS256));
        assert_eq!(
            "XX256".parse::<AlgorithmCode>(),
            Err(UnknownAlgorithm("XX256".to_string()))
        );
        assert_eq!(AlgorithmCode::HS512.to_string(), "HS512");
        assert!(!AlgorithmCode::HS256.is_asymmetric());
        assert!(AlgorithmCode::PS256.is_asymmetric());
    }

    #[test]
    fn test_family_names() {
        assert_eq!(KeyFamily::RsaPkcs1v15.name(), "RSASSA-PKCS1-v1_5");
        assert_eq!(KeyFamily::RsaPss.code_prefix(), "PS");
        assert!(KeyFamily::RsaPss.is_rsa());
        assert!(!KeyFamily::Ecdsa.is_rsa());
    }
}
