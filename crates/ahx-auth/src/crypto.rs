//! Key handles and signature primitives.
//!
//! A [`KeyHandle`] is an opaque, cheaply clonable reference to one key: an RSA
//! or EC private/public key, or an HMAC secret. It knows the algorithm it is
//! bound to, its permitted usages and an optional key id, and performs the
//! raw sign/verify operations for all twelve [`AlgorithmCode`]s.
//!
//! Signatures use the JWS encodings: PKCS#1/PSS signatures are the raw
//! modulus-sized octets and ECDSA signatures are the fixed-width `r || s`
//! concatenation.

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384, Sha512};
use time::OffsetDateTime;

use crate::alg::{
    AlgorithmCode, AlgorithmDescriptor, HashAlgorithm, KeyAlgorithm, KeyFamily, NamedCurve,
    code_for_key,
};

// ============================================================================
// Error Types
// ============================================================================

/// Errors from key handling and signature operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CryptoError {
    /// Key material is malformed or inconsistent.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },

    /// A key could not be generated.
    #[error("Key generation failed: {message}")]
    KeyGeneration {
        /// Description of the failure.
        message: String,
    },

    /// The signing operation failed.
    #[error("Signing failed: {message}")]
    Signing {
        /// Description of the failure.
        message: String,
    },

    /// The algorithm or hash is not supported for this operation.
    #[error("Unsupported algorithm: {message}")]
    UnsupportedAlgorithm {
        /// Description of what is unsupported.
        message: String,
    },

    /// The requested algorithm family does not match the key.
    #[error("Algorithm mismatch: key is {key}, operation requested {requested}")]
    AlgorithmMismatch {
        /// The key's family.
        key: KeyFamily,
        /// The requested family.
        requested: KeyFamily,
    },

    /// The key may not be used for this operation.
    #[error("Key usage not permitted: {usage}")]
    UsageNotPermitted {
        /// The usage that was attempted.
        usage: KeyUsage,
    },
}

impl CryptoError {
    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
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

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm {
            message: message.into(),
        }
    }
}

// ============================================================================
// Key Metadata
// ============================================================================

/// Whether a key is public, private, or a shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Public half of an asymmetric pair.
    Public,
    /// Private half of an asymmetric pair.
    Private,
    /// Symmetric secret.
    Secret,
}

/// An operation a key is permitted to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUsage {
    /// Produce signatures.
    Sign,
    /// Check signatures.
    Verify,
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sign => write!(f, "sign"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

// ============================================================================
// Key Material
// ============================================================================

pub(crate) enum EcPrivate {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    P521(p521::ecdsa::SigningKey),
}

pub(crate) enum EcPublic {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
}

pub(crate) enum KeyMaterial {
    RsaPrivate(RsaPrivateKey),
    RsaPublic(RsaPublicKey),
    EcPrivate(EcPrivate),
    EcPublic(EcPublic),
    Secret(Vec<u8>),
}

impl EcPrivate {
    fn random(curve: NamedCurve) -> Self {
        match curve {
            NamedCurve::P256 => Self::P256(p256::ecdsa::SigningKey::random(&mut OsRng)),
            NamedCurve::P384 => Self::P384(p384::ecdsa::SigningKey::random(&mut OsRng)),
            NamedCurve::P521 => Self::P521(p521::ecdsa::SigningKey::random(&mut OsRng)),
        }
    }

    pub(crate) fn from_scalar(curve: NamedCurve, d: &[u8]) -> Result<Self, CryptoError> {
        let invalid = |e: p256::ecdsa::Error| CryptoError::invalid_key(e.to_string());
        Ok(match curve {
            NamedCurve::P256 => Self::P256(p256::ecdsa::SigningKey::from_slice(d).map_err(invalid)?),
            NamedCurve::P384 => Self::P384(p384::ecdsa::SigningKey::from_slice(d).map_err(invalid)?),
            NamedCurve::P521 => Self::P521(p521::ecdsa::SigningKey::from_slice(d).map_err(invalid)?),
        })
    }

    pub(crate) fn curve(&self) -> NamedCurve {
        match self {
            Self::P256(_) => NamedCurve::P256,
            Self::P384(_) => NamedCurve::P384,
            Self::P521(_) => NamedCurve::P521,
        }
    }

    pub(crate) fn scalar_bytes(&self) -> Vec<u8> {
        match self {
            Self::P256(k) => k.to_bytes().to_vec(),
            Self::P384(k) => k.to_bytes().to_vec(),
            Self::P521(k) => k.to_bytes().to_vec(),
        }
    }

    pub(crate) fn public(&self) -> EcPublic {
        match self {
            Self::P256(k) => EcPublic::P256(k.verifying_key().clone()),
            Self::P384(k) => EcPublic::P384(k.verifying_key().clone()),
            Self::P521(k) => EcPublic::P521(p521::ecdsa::VerifyingKey::from(k)),
        }
    }

    fn sign_prehash(&self, prehash: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let failed = |e: p256::ecdsa::Error| CryptoError::signing(e.to_string());
        Ok(match self {
            Self::P256(k) => {
                let sig: p256::ecdsa::Signature = k.sign_prehash(prehash).map_err(failed)?;
                sig.to_bytes().to_vec()
            }
            Self::P384(k) => {
                let sig: p384::ecdsa::Signature = k.sign_prehash(prehash).map_err(failed)?;
                sig.to_bytes().to_vec()
            }
            Self::P521(k) => {
                let sig: p521::ecdsa::Signature = k.sign_prehash(prehash).map_err(failed)?;
                sig.to_bytes().to_vec()
            }
        })
    }
}

impl EcPublic {
    pub(crate) fn from_coordinates(
        curve: NamedCurve,
        x: &[u8],
        y: &[u8],
    ) -> Result<Self, CryptoError> {
        let len = curve.component_len();
        if x.len() != len || y.len() != len {
            return Err(CryptoError::invalid_key(format!(
                "{} coordinates must be {len} bytes",
                curve.name()
            )));
        }

        let mut sec1 = Vec::with_capacity(1 + 2 * len);
        sec1.push(0x04);
        sec1.extend_from_slice(x);
        sec1.extend_from_slice(y);

        let invalid = |e: p256::ecdsa::Error| CryptoError::invalid_key(e.to_string());
        Ok(match curve {
            NamedCurve::P256 => {
                Self::P256(p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).map_err(invalid)?)
            }
            NamedCurve::P384 => {
                Self::P384(p384::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).map_err(invalid)?)
            }
            NamedCurve::P521 => {
                Self::P521(p521::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).map_err(invalid)?)
            }
        })
    }

    pub(crate) fn curve(&self) -> NamedCurve {
        match self {
            Self::P256(_) => NamedCurve::P256,
            Self::P384(_) => NamedCurve::P384,
            Self::P521(_) => NamedCurve::P521,
        }
    }

    /// Returns the uncompressed affine coordinates `(x, y)`.
    pub(crate) fn coordinates(&self) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let point = match self {
            Self::P256(k) => {
                let p = k.to_encoded_point(false);
                (p.x().map(|c| c.to_vec()), p.y().map(|c| c.to_vec()))
            }
            Self::P384(k) => {
                let p = k.to_encoded_point(false);
                (p.x().map(|c| c.to_vec()), p.y().map(|c| c.to_vec()))
            }
            Self::P521(k) => {
                let p = k.to_encoded_point(false);
                (p.x().map(|c| c.to_vec()), p.y().map(|c| c.to_vec()))
            }
        };
        match point {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(CryptoError::invalid_key("EC point is the identity")),
        }
    }

    fn verify_prehash(&self, prehash: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::P256(k) => p256::ecdsa::Signature::from_slice(signature)
                .is_ok_and(|sig| k.verify_prehash(prehash, &sig).is_ok()),
            Self::P384(k) => p384::ecdsa::Signature::from_slice(signature)
                .is_ok_and(|sig| k.verify_prehash(prehash, &sig).is_ok()),
            Self::P521(k) => p521::ecdsa::Signature::from_slice(signature)
                .is_ok_and(|sig| k.verify_prehash(prehash, &sig).is_ok()),
        }
    }
}

impl KeyMaterial {
    fn key_type(&self) -> KeyType {
        match self {
            Self::RsaPrivate(_) | Self::EcPrivate(_) => KeyType::Private,
            Self::RsaPublic(_) | Self::EcPublic(_) => KeyType::Public,
            Self::Secret(_) => KeyType::Secret,
        }
    }
}

// ============================================================================
// Key Handle
// ============================================================================

struct KeyInner {
    algorithm: KeyAlgorithm,
    kid: Option<String>,
    usages: Vec<KeyUsage>,
    material: KeyMaterial,
}

/// An opaque reference to a single key.
///
/// Cloning is cheap; clones share the underlying material.
#[derive(Clone)]
pub struct KeyHandle {
    inner: Arc<KeyInner>,
}

impl KeyHandle {
    pub(crate) fn from_material(
        algorithm: KeyAlgorithm,
        kid: Option<String>,
        material: KeyMaterial,
    ) -> Result<Self, CryptoError> {
        match (&material, algorithm.family) {
            (KeyMaterial::RsaPrivate(_) | KeyMaterial::RsaPublic(_), f) if f.is_rsa() => {}
            (KeyMaterial::EcPrivate(k), KeyFamily::Ecdsa)
                if algorithm.named_curve == Some(k.curve()) => {}
            (KeyMaterial::EcPublic(k), KeyFamily::Ecdsa)
                if algorithm.named_curve == Some(k.curve()) => {}
            (KeyMaterial::Secret(_), KeyFamily::Hmac) => {}
            _ => {
                return Err(CryptoError::invalid_key(format!(
                    "key material does not match algorithm {}",
                    algorithm.family
                )));
            }
        }

        let usages = match material.key_type() {
            KeyType::Private => vec![KeyUsage::Sign],
            KeyType::Public => vec![KeyUsage::Verify],
            KeyType::Secret => vec![KeyUsage::Sign, KeyUsage::Verify],
        };

        Ok(Self {
            inner: Arc::new(KeyInner {
                algorithm,
                kid,
                usages,
                material,
            }),
        })
    }

    /// Creates an HMAC key from a shared secret.
    ///
    /// # Errors
    ///
    /// Returns an error if `code` is not an HMAC code or the secret is empty.
    pub fn hmac_secret(
        code: AlgorithmCode,
        secret: impl Into<Vec<u8>>,
        kid: Option<String>,
    ) -> Result<Self, CryptoError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CryptoError::invalid_key("HMAC secret must not be empty"));
        }
        let descriptor = code.descriptor();
        if descriptor.family != KeyFamily::Hmac {
            return Err(CryptoError::unsupported(format!("{code} is not an HMAC algorithm")));
        }
        Self::from_material(descriptor.into(), kid, KeyMaterial::Secret(secret))
    }

    /// Generates a random HMAC secret sized to the hash output.
    ///
    /// # Errors
    ///
    /// Returns an error if `code` is not an HMAC code.
    pub fn generate_secret(code: AlgorithmCode) -> Result<Self, CryptoError> {
        let len = match code {
            AlgorithmCode::HS256 => 32,
            AlgorithmCode::HS384 => 48,
            AlgorithmCode::HS512 => 64,
            other => {
                return Err(CryptoError::unsupported(format!(
                    "{other} is not an HMAC algorithm"
                )));
            }
        };
        let mut secret = vec![0u8; len];
        OsRng.fill_bytes(&mut secret);
        Self::hmac_secret(code, secret, Some(uuid::Uuid::new_v4().to_string()))
    }

    /// Returns the algorithm this key is bound to.
    #[must_use]
    pub fn algorithm(&self) -> &KeyAlgorithm {
        &self.inner.algorithm
    }

    /// Returns the algorithm code for this key, if it resolves to one.
    #[must_use]
    pub fn code(&self) -> Option<AlgorithmCode> {
        code_for_key(&self.inner.algorithm)
    }

    /// Returns whether this is a public, private, or secret key.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        self.inner.material.key_type()
    }

    /// Returns the permitted usages.
    #[must_use]
    pub fn usages(&self) -> &[KeyUsage] {
        &self.inner.usages
    }

    /// Returns `true` if the key may perform `usage`.
    #[must_use]
    pub fn can(&self, usage: KeyUsage) -> bool {
        self.inner.usages.contains(&usage)
    }

    /// Returns the key id.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.inner.kid.as_deref()
    }

    pub(crate) fn material(&self) -> &KeyMaterial {
        &self.inner.material
    }

    /// Derives the public key for an asymmetric private key.
    ///
    /// Returns `None` for public keys and secrets.
    #[must_use]
    pub fn public_key(&self) -> Option<KeyHandle> {
        let material = match &self.inner.material {
            KeyMaterial::RsaPrivate(k) => KeyMaterial::RsaPublic(k.to_public_key()),
            KeyMaterial::EcPrivate(k) => KeyMaterial::EcPublic(k.public()),
            _ => return None,
        };
        Self::from_material(self.inner.algorithm, self.inner.kid.clone(), material).ok()
    }

    /// Signs `data` with the algorithm parameters in `params`.
    ///
    /// The key's own hash takes precedence over `params.hash`, mirroring how
    /// key-bound parameters override per-call ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the key may not sign, the family does not match,
    /// or the primitive fails.
    pub fn sign(&self, params: &AlgorithmDescriptor, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if !self.can(KeyUsage::Sign) {
            return Err(CryptoError::UsageNotPermitted {
                usage: KeyUsage::Sign,
            });
        }
        let hash = self.effective_hash(params)?;

        match &self.inner.material {
            KeyMaterial::RsaPrivate(key) => {
                let hashed = digest(hash, data)?;
                let result = match params.family {
                    KeyFamily::RsaPss => {
                        key.sign_with_rng(&mut OsRng, pss_scheme(hash, params.salt_length)?, &hashed)
                    }
                    _ => key.sign(pkcs1v15_scheme(hash)?, &hashed),
                };
                result.map_err(|e| CryptoError::signing(e.to_string()))
            }
            KeyMaterial::EcPrivate(key) => key.sign_prehash(&digest(hash, data)?),
            KeyMaterial::Secret(secret) => hmac_tag(hash, secret, data),
            KeyMaterial::RsaPublic(_) | KeyMaterial::EcPublic(_) => {
                Err(CryptoError::UsageNotPermitted {
                    usage: KeyUsage::Sign,
                })
            }
        }
    }

    /// Verifies `signature` over `data`.
    ///
    /// Returns `Ok(false)` for a signature that does not match, including one
    /// that is malformed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key may not verify or the family does not match.
    pub fn verify(
        &self,
        params: &AlgorithmDescriptor,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool, CryptoError> {
        if !self.can(KeyUsage::Verify) {
            return Err(CryptoError::UsageNotPermitted {
                usage: KeyUsage::Verify,
            });
        }
        let hash = self.effective_hash(params)?;

        match &self.inner.material {
            KeyMaterial::RsaPublic(key) => {
                let hashed = digest(hash, data)?;
                let result = match params.family {
                    KeyFamily::RsaPss => {
                        key.verify(pss_scheme(hash, params.salt_length)?, &hashed, signature)
                    }
                    _ => key.verify(pkcs1v15_scheme(hash)?, &hashed, signature),
                };
                Ok(result.is_ok())
            }
            KeyMaterial::EcPublic(key) => {
                // Curves reject digests shorter than half their field size.
                Ok(digest(hash, data).is_ok_and(|prehash| key.verify_prehash(&prehash, signature)))
            }
            KeyMaterial::Secret(secret) => Ok(hmac_verify(hash, secret, data, signature)),
            KeyMaterial::RsaPrivate(_) | KeyMaterial::EcPrivate(_) => {
                Err(CryptoError::UsageNotPermitted {
                    usage: KeyUsage::Verify,
                })
            }
        }
    }

    fn effective_hash(&self, params: &AlgorithmDescriptor) -> Result<HashAlgorithm, CryptoError> {
        let algorithm = &self.inner.algorithm;
        if algorithm.family != params.family {
            return Err(CryptoError::AlgorithmMismatch {
                key: algorithm.family,
                requested: params.family,
            });
        }
        Ok(algorithm.hash.unwrap_or(params.hash))
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("algorithm", &self.inner.algorithm)
            .field("key_type", &self.key_type())
            .field("kid", &self.inner.kid)
            .field("usages", &self.inner.usages)
            .finish_non_exhaustive()
    }
}

fn digest(hash: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Ok(match hash {
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        HashAlgorithm::Sha1 => return Err(CryptoError::unsupported("SHA-1 signatures")),
    })
}

fn pkcs1v15_scheme(hash: HashAlgorithm) -> Result<Pkcs1v15Sign, CryptoError> {
    Ok(match hash {
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        HashAlgorithm::Sha1 => return Err(CryptoError::unsupported("SHA-1 signatures")),
    })
}

fn pss_scheme(hash: HashAlgorithm, salt_length: Option<usize>) -> Result<Pss, CryptoError> {
    Ok(match hash {
        HashAlgorithm::Sha256 => Pss::new_with_salt::<Sha256>(salt_length.unwrap_or(32)),
        HashAlgorithm::Sha384 => Pss::new_with_salt::<Sha384>(salt_length.unwrap_or(48)),
        HashAlgorithm::Sha512 => Pss::new_with_salt::<Sha512>(salt_length.unwrap_or(64)),
        HashAlgorithm::Sha1 => return Err(CryptoError::unsupported("SHA-1 signatures")),
    })
}

fn hmac_tag(hash: HashAlgorithm, secret: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let invalid = |e: hmac::digest::InvalidLength| CryptoError::invalid_key(e.to_string());
    Ok(match hash {
        HashAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(invalid)?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(secret).map_err(invalid)?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(secret).map_err(invalid)?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha1 => return Err(CryptoError::unsupported("SHA-1 signatures")),
    })
}

fn hmac_verify(hash: HashAlgorithm, secret: &[u8], data: &[u8], tag: &[u8]) -> bool {
    match hash {
        HashAlgorithm::Sha256 => Hmac::<Sha256>::new_from_slice(secret).is_ok_and(|mut mac| {
            mac.update(data);
            mac.verify_slice(tag).is_ok()
        }),
        HashAlgorithm::Sha384 => Hmac::<Sha384>::new_from_slice(secret).is_ok_and(|mut mac| {
            mac.update(data);
            mac.verify_slice(tag).is_ok()
        }),
        HashAlgorithm::Sha512 => Hmac::<Sha512>::new_from_slice(secret).is_ok_and(|mut mac| {
            mac.update(data);
            mac.verify_slice(tag).is_ok()
        }),
        HashAlgorithm::Sha1 => false,
    }
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// An asymmetric signing key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Private half, used for signing.
    pub private_key: KeyHandle,
    /// Public half, used for verification and JWKS publication.
    pub public_key: KeyHandle,
    /// When the pair was generated, if known.
    pub created_at: Option<OffsetDateTime>,
}

impl KeyPair {
    /// Generates a new pair for an asymmetric algorithm code.
    ///
    /// RSA keys use public exponent 65537 and `modulus_bits`; EC keys use the
    /// curve of the code. Both halves share a freshly generated key id.
    ///
    /// This is CPU-bound (seconds for 4096-bit RSA); call it from a blocking
    /// context.
    ///
    /// # Errors
    ///
    /// Returns an error for HMAC codes or if generation fails.
    pub fn generate(code: AlgorithmCode, modulus_bits: usize) -> Result<Self, CryptoError> {
        let descriptor = code.descriptor();
        let algorithm = KeyAlgorithm::from(descriptor);
        let kid = Some(uuid::Uuid::new_v4().to_string());

        let material = match descriptor.family {
            KeyFamily::RsaPkcs1v15 | KeyFamily::RsaPss => {
                let key = RsaPrivateKey::new(&mut OsRng, modulus_bits)
                    .map_err(|e| CryptoError::key_generation(e.to_string()))?;
                KeyMaterial::RsaPrivate(key)
            }
            KeyFamily::Ecdsa => {
                let curve = descriptor
                    .named_curve
                    .ok_or_else(|| CryptoError::key_generation("ECDSA code without a curve"))?;
                KeyMaterial::EcPrivate(EcPrivate::random(curve))
            }
            KeyFamily::Hmac => {
                return Err(CryptoError::unsupported(format!(
                    "{code} has no key pair; use a shared secret"
                )));
            }
        };

        let private_key = KeyHandle::from_material(algorithm, kid, material)?;
        let mut pair = Self::from_private(private_key)?;
        pair.created_at = Some(OffsetDateTime::now_utc());
        Ok(pair)
    }

    /// Builds a pair by deriving the public half from a private key.
    ///
    /// # Errors
    ///
    /// Returns an error if `private_key` is not an asymmetric private key.
    pub fn from_private(private_key: KeyHandle) -> Result<Self, CryptoError> {
        let public_key = private_key
            .public_key()
            .ok_or_else(|| CryptoError::invalid_key("not an asymmetric private key"))?;
        Ok(Self {
            private_key,
            public_key,
            created_at: None,
        })
    }

    /// Returns the key id shared by both halves.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.private_key.kid()
    }

    /// Returns the RSA modulus size in bits, for RSA pairs.
    #[must_use]
    pub fn modulus_bits(&self) -> Option<usize> {
        match self.public_key.material() {
            KeyMaterial::RsaPublic(k) => Some(k.size() * 8),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &[u8] = b"header.payload";

    #[test]
    fn test_ec_sign_verify_all_curves() {
        for code in [AlgorithmCode::ES256, AlgorithmCode::ES384, AlgorithmCode::ES512] {
            let pair = KeyPair::generate(code, 0).unwrap();
            let params = code.descriptor();

            let signature = pair.private_key.sign(&params, DATA).unwrap();
            let component = params.named_curve.unwrap().component_len();
            assert_eq!(signature.len(), component * 2, "{code} signature width");

            assert!(pair.public_key.verify(&params, &signature, DATA).unwrap());
            assert!(!pair.public_key.verify(&params, &signature, b"tampered").unwrap());
            assert!(!pair.public_key.verify(&params, b"short", DATA).unwrap());
        }
    }

    #[test]
    fn test_rsa_sign_verify() {
        let pair = KeyPair::generate(AlgorithmCode::PS256, 2048).unwrap();
        assert_eq!(pair.modulus_bits(), Some(2048));

        let params = AlgorithmCode::PS256.descriptor();
        let signature = pair.private_key.sign(&params, DATA).unwrap();
        assert_eq!(signature.len(), 256);
        assert!(pair.public_key.verify(&params, &signature, DATA).unwrap());
        assert!(!pair.public_key.verify(&params, &signature, b"other").unwrap());
    }

    #[test]
    fn test_rsa_family_must_match() {
        let pair = KeyPair::generate(AlgorithmCode::RS256, 2048).unwrap();
        let pss = AlgorithmCode::PS256.descriptor();

        let err = pair.private_key.sign(&pss, DATA).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::AlgorithmMismatch {
                key: KeyFamily::RsaPkcs1v15,
                requested: KeyFamily::RsaPss
            }
        ));
    }

    #[test]
    fn test_hmac_sign_verify() {
        let key = KeyHandle::hmac_secret(AlgorithmCode::HS256, b"secret".to_vec(), None).unwrap();
        assert_eq!(key.key_type(), KeyType::Secret);
        assert!(key.can(KeyUsage::Sign));
        assert!(key.can(KeyUsage::Verify));

        let params = AlgorithmCode::HS256.descriptor();
        let tag = key.sign(&params, DATA).unwrap();
        assert_eq!(tag.len(), 32);
        assert!(key.verify(&params, &tag, DATA).unwrap());
        assert!(!key.verify(&params, &tag, b"other").unwrap());

        let other = KeyHandle::generate_secret(AlgorithmCode::HS256).unwrap();
        assert!(!other.verify(&params, &tag, DATA).unwrap());
    }

    #[test]
    fn test_usages_enforced() {
        let pair = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let params = AlgorithmCode::ES256.descriptor();

        assert_eq!(pair.private_key.key_type(), KeyType::Private);
        assert_eq!(pair.private_key.usages(), &[KeyUsage::Sign]);
        assert_eq!(pair.public_key.key_type(), KeyType::Public);
        assert_eq!(pair.public_key.usages(), &[KeyUsage::Verify]);

        assert!(matches!(
            pair.public_key.sign(&params, DATA),
            Err(CryptoError::UsageNotPermitted { usage: KeyUsage::Sign })
        ));
        assert!(matches!(
            pair.private_key.verify(&params, b"sig", DATA),
            Err(CryptoError::UsageNotPermitted { usage: KeyUsage::Verify })
        ));
    }

    #[test]
    fn test_pair_shares_kid_and_code() {
        let pair = KeyPair::generate(AlgorithmCode::ES384, 0).unwrap();
        assert!(pair.kid().is_some());
        assert_eq!(pair.public_key.kid(), pair.kid());
        assert_eq!(pair.private_key.code(), Some(AlgorithmCode::ES384));
        assert_eq!(pair.public_key.code(), Some(AlgorithmCode::ES384));
        assert!(pair.created_at.is_some());
        assert!(pair.public_key.public_key().is_none());
    }

    #[test]
    fn test_hmac_has_no_pair() {
        assert!(matches!(
            KeyPair::generate(AlgorithmCode::HS256, 0),
            Err(CryptoError::UnsupportedAlgorithm { .. })
        ));
        assert!(KeyHandle::generate_secret(AlgorithmCode::ES256).is_err());
        assert!(KeyHandle::hmac_secret(AlgorithmCode::HS256, Vec::new(), None).is_err());
    }
}
