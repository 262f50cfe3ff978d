//! Token verification.

use futures_util::StreamExt;

use crate::AuthResult;
use crate::alg::descriptor_for_name;
use crate::crypto::{KeyType, KeyUsage};
use crate::encoding::{b64_decode, decode_json_part};
use crate::request::RequestContext;
use crate::supplier::KeySupplier;

use super::now_seconds;
use super::types::{JwtClaims, JwtHeader, VerifyMode};

/// Verifies `token` against the keys of `supplier` and returns its claims.
///
/// Returns `Ok(None)` for any token that should be rejected: malformed,
/// wrong `typ`, unsupported `alg`, expired or not yet valid (in
/// [`VerifyMode::Access`]), or not signed by any supplied key.
///
/// # Errors
///
/// Returns an error only if the supplier fails, e.g. a remote JWKS endpoint
/// is unreachable or local key material is corrupt.
pub async fn verify_token(
    req: &RequestContext,
    token: &str,
    supplier: &dyn KeySupplier,
    mode: VerifyMode,
) -> AuthResult<Option<JwtClaims>> {
    let Some((header_part, payload_part, signature_part)) = split_token(token) else {
        reject("malformed token", None);
        return Ok(None);
    };

    let Some(header) = decode_json_part::<JwtHeader>(header_part) else {
        reject("malformed header", None);
        return Ok(None);
    };
    if header.typ.as_deref() != Some("JWT") {
        reject("unsupported token type", None);
        return Ok(None);
    }

    let Some(descriptor) = descriptor_for_name(&header.alg) else {
        tracing::warn!(
            kind = "verification",
            reason = "unsupported algorithm",
            alg = %header.alg,
            "Token rejected"
        );
        return Ok(None);
    };

    let Some(claims) = decode_json_part::<JwtClaims>(payload_part) else {
        reject("malformed payload", None);
        return Ok(None);
    };

    if mode == VerifyMode::Access {
        let now = now_seconds() as f64;
        if claims.exp().is_some_and(|exp| now > exp) {
            reject("expired", Some(&claims));
            return Ok(None);
        }
        if claims.nbf().is_some_and(|nbf| now < nbf) {
            reject("not before", Some(&claims));
            return Ok(None);
        }
    }

    let Some(signature) = b64_decode(signature_part) else {
        reject("invalid signature", Some(&claims));
        return Ok(None);
    };
    let signing_input = &token[..header_part.len() + 1 + payload_part.len()];

    let mut keys = supplier.keys(req, Some(&header)).await?;
    while let Some(key) = keys.next().await {
        let key = key?;
        if key.key_type() == KeyType::Private
            || key.algorithm().family != descriptor.family
            || !key.can(KeyUsage::Verify)
        {
            continue;
        }

        match key.verify(&descriptor, &signature, signing_input.as_bytes()) {
            Ok(true) => {
                tracing::debug!(kid = ?key.kid(), jti = ?claims.jti(), "Token validated");
                return Ok(Some(claims));
            }
            Ok(false) => {}
            Err(e) => tracing::debug!(kid = ?key.kid(), error = %e, "Skipping key"),
        }
    }

    reject("invalid signature", Some(&claims));
    Ok(None)
}

/// Decodes the claims of a token without checking its signature.
///
/// Returns `None` unless `token` has three segments and a JSON object payload.
#[must_use]
pub fn decode_token_payload(token: &str) -> Option<JwtClaims> {
    let (_, payload_part, _) = split_token(token)?;
    decode_json_part(payload_part)
}

/// Decodes the header of a token without checking its signature.
#[must_use]
pub fn decode_token_header(token: &str) -> Option<JwtHeader> {
    let (header_part, _, _) = split_token(token)?;
    decode_json_part(header_part)
}

fn split_token(token: &str) -> Option<(&str, &str, &str)> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => {
            Some((header, payload, signature))
        }
        _ => None,
    }
}

fn reject(reason: &str, claims: Option<&JwtClaims>) {
    tracing::warn!(
        kind = "verification",
        reason,
        sub = ?claims.and_then(JwtClaims::sub),
        jti = ?claims.and_then(JwtClaims::jti),
        "Token rejected"
    );
}
