//! JSON Web Key import and export.
//!
//! Keys are persisted and published as JWKs. Public keys export `n`/`e` (RSA)
//! or `crv`/`x`/`y` (EC); private keys additionally export `d` and the CRT
//! parameters; HMAC secrets export `k`. Every exported key carries its `alg`
//! so it can be re-imported with the same parameters.

use rsa::BigUint;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::alg::{AlgorithmCode, AlgorithmDescriptor, KeyAlgorithm, KeyFamily, NamedCurve};
use crate::crypto::{CryptoError, EcPrivate, EcPublic, KeyHandle, KeyMaterial, KeyType};
use crate::encoding::{b64_decode, b64_encode};

/// JSON Web Key Set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Creates a new empty JWKS.
    #[must_use]
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Adds a key to the set.
    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }

    /// Finds a key by id.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the set has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for Jwks {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "oct").
    pub kty: String,

    /// Key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Key use ("sig" for signing).
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    /// Algorithm code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Permitted operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,

    /// Whether the key may be exported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<bool>,

    // RSA-specific fields
    /// RSA modulus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// RSA private exponent, or EC private scalar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// RSA first prime factor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    /// RSA second prime factor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    /// RSA first factor CRT exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    /// RSA second factor CRT exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    /// RSA CRT coefficient.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,

    // EC-specific fields
    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// EC x coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    // Symmetric
    /// HMAC secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl Jwk {
    /// Exports a key handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the key's algorithm does not resolve to a code or
    /// its material cannot be encoded.
    pub fn from_key(key: &KeyHandle) -> Result<Self, CryptoError> {
        let code = key
            .code()
            .ok_or_else(|| CryptoError::unsupported("key algorithm has no JWS code"))?;

        let key_ops = key.usages().iter().map(ToString::to_string).collect();
        let mut jwk = Self {
            kid: key.kid().map(str::to_string),
            use_: Some("sig".to_string()),
            alg: Some(code.as_str().to_string()),
            key_ops: Some(key_ops),
            ext: Some(true),
            ..Self::default()
        };

        match key.material() {
            KeyMaterial::RsaPublic(k) => {
                jwk.kty = "RSA".to_string();
                write_rsa_public(&mut jwk, k);
            }
            KeyMaterial::RsaPrivate(k) => {
                jwk.kty = "RSA".to_string();
                write_rsa_public(&mut jwk, &k.to_public_key());
                jwk.d = Some(biguint(k.d()));
                if let [p, q] = k.primes() {
                    jwk.p = Some(biguint(p));
                    jwk.q = Some(biguint(q));
                }
                jwk.dp = k.dp().map(biguint);
                jwk.dq = k.dq().map(biguint);
                jwk.qi = k.crt_coefficient().as_ref().map(biguint);
            }
            KeyMaterial::EcPublic(k) => {
                jwk.kty = "EC".to_string();
                write_ec_public(&mut jwk, k)?;
            }
            KeyMaterial::EcPrivate(k) => {
                jwk.kty = "EC".to_string();
                write_ec_public(&mut jwk, &k.public())?;
                jwk.d = Some(b64_encode(k.scalar_bytes()));
            }
            KeyMaterial::Secret(secret) => {
                jwk.kty = "oct".to_string();
                jwk.k = Some(b64_encode(secret));
            }
        }

        Ok(jwk)
    }

    /// Returns `true` if this JWK carries private or secret material.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.d.is_some() || self.k.is_some()
    }

    /// Returns the algorithm code this JWK should be used with.
    ///
    /// Falls back to the curve for EC keys without `alg`.
    #[must_use]
    pub fn algorithm_code(&self) -> Option<AlgorithmCode> {
        match &self.alg {
            Some(alg) => AlgorithmCode::from_name(alg),
            None if self.kty == "EC" => match self.crv.as_deref().and_then(NamedCurve::from_name) {
                Some(NamedCurve::P256) => Some(AlgorithmCode::ES256),
                Some(NamedCurve::P384) => Some(AlgorithmCode::ES384),
                Some(NamedCurve::P521) => Some(AlgorithmCode::ES512),
                None => None,
            },
            None => None,
        }
    }

    /// Imports this JWK as a key handle.
    ///
    /// Keys with `d` import as private signing keys, `oct` keys as secrets,
    /// and everything else as public verification keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is unsupported, the key type does not
    /// match it, or the key material is malformed.
    pub fn to_key(&self) -> Result<KeyHandle, CryptoError> {
        let code = self.algorithm_code().ok_or_else(|| {
            CryptoError::unsupported(format!(
                "JWK algorithm {}",
                self.alg.as_deref().unwrap_or("(missing)")
            ))
        })?;
        let descriptor = code.descriptor();
        let algorithm = KeyAlgorithm::from(descriptor);
        let kid = self.kid.clone();

        let material = match descriptor.family {
            KeyFamily::RsaPkcs1v15 | KeyFamily::RsaPss => {
                self.expect_kty("RSA", code)?;
                self.rsa_material()?
            }
            KeyFamily::Ecdsa => {
                self.expect_kty("EC", code)?;
                self.ec_material(&descriptor)?
            }
            KeyFamily::Hmac => {
                self.expect_kty("oct", code)?;
                KeyMaterial::Secret(decode_field(&self.k, "k")?)
            }
        };

        KeyHandle::from_material(algorithm, kid, material)
    }

    fn expect_kty(&self, kty: &str, code: AlgorithmCode) -> Result<(), CryptoError> {
        if self.kty == kty {
            Ok(())
        } else {
            Err(CryptoError::invalid_key(format!(
                "kty {} cannot be used with {code}",
                self.kty
            )))
        }
    }

    fn rsa_material(&self) -> Result<KeyMaterial, CryptoError> {
        let n = BigUint::from_bytes_be(&decode_field(&self.n, "n")?);
        let e = BigUint::from_bytes_be(&decode_field(&self.e, "e")?);

        if self.d.is_none() {
            let key =
                RsaPublicKey::new(n, e).map_err(|err| CryptoError::invalid_key(err.to_string()))?;
            return Ok(KeyMaterial::RsaPublic(key));
        }

        let d = BigUint::from_bytes_be(&decode_field(&self.d, "d")?);
        let p = BigUint::from_bytes_be(&decode_field(&self.p, "p")?);
        let q = BigUint::from_bytes_be(&decode_field(&self.q, "q")?);
        let key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|err| CryptoError::invalid_key(err.to_string()))?;
        key.validate()
            .map_err(|err| CryptoError::invalid_key(err.to_string()))?;
        Ok(KeyMaterial::RsaPrivate(key))
    }

    fn ec_material(&self, descriptor: &AlgorithmDescriptor) -> Result<KeyMaterial, CryptoError> {
        let curve = descriptor
            .named_curve
            .ok_or_else(|| CryptoError::invalid_key("ECDSA algorithm without a curve"))?;
        if self.crv.as_deref() != Some(curve.name()) {
            return Err(CryptoError::invalid_key(format!(
                "crv {} does not match {}",
                self.crv.as_deref().unwrap_or("(missing)"),
                curve.name()
            )));
        }

        let x = decode_field(&self.x, "x")?;
        let y = decode_field(&self.y, "y")?;

        if self.d.is_none() {
            return Ok(KeyMaterial::EcPublic(EcPublic::from_coordinates(curve, &x, &y)?));
        }

        let private = EcPrivate::from_scalar(curve, &decode_field(&self.d, "d")?)?;
        let (px, py) = private.public().coordinates()?;
        if px != x || py != y {
            return Err(CryptoError::invalid_key(
                "EC private scalar does not match public coordinates",
            ));
        }
        Ok(KeyMaterial::EcPrivate(private))
    }
}

impl KeyHandle {
    /// Exports this key as a JWK. Shorthand for [`Jwk::from_key`].
    ///
    /// # Errors
    ///
    /// See [`Jwk::from_key`].
    pub fn to_jwk(&self) -> Result<Jwk, CryptoError> {
        Jwk::from_key(self)
    }

    /// Imports a key from a JWK. Shorthand for [`Jwk::to_key`].
    ///
    /// # Errors
    ///
    /// See [`Jwk::to_key`].
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, CryptoError> {
        jwk.to_key()
    }

    /// Returns `true` if the key is safe to publish.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.key_type() == KeyType::Public
    }
}

fn write_rsa_public(jwk: &mut Jwk, key: &RsaPublicKey) {
    jwk.n = Some(biguint(key.n()));
    jwk.e = Some(biguint(key.e()));
}

fn write_ec_public(jwk: &mut Jwk, key: &EcPublic) -> Result<(), CryptoError> {
    let (x, y) = key.coordinates()?;
    jwk.crv = Some(key.curve().name().to_string());
    jwk.x = Some(b64_encode(x));
    jwk.y = Some(b64_encode(y));
    Ok(())
}

fn biguint(value: &BigUint) -> String {
    b64_encode(value.to_bytes_be())
}

fn decode_field(value: &Option<String>, name: &str) -> Result<Vec<u8>, CryptoError> {
    let encoded = value
        .as_deref()
        .ok_or_else(|| CryptoError::invalid_key(format!("missing JWK parameter {name}")))?;
    b64_decode(encoded)
        .ok_or_else(|| CryptoError::invalid_key(format!("JWK parameter {name} is not base64url")))
}
