//! Refresh token verification.

use futures_util::StreamExt;

use crate::AuthResult;
use crate::crypto::{KeyType, KeyUsage};
use crate::encoding::b64_decode;
use crate::request::RequestContext;
use crate::supplier::KeySupplier;

use super::types::Tokens;

/// Checks that `tokens.refresh_token` is a signature over
/// `tokens.access_token` by one of the supplier's keys.
///
/// The access token itself is not verified; callers pair this with
/// [`verify_token`](super::verify_token) in [`VerifyMode::Refresh`](super::VerifyMode::Refresh).
///
/// # Errors
///
/// Returns an error only if the supplier fails.
pub async fn verify_refresh_token(
    req: &RequestContext,
    tokens: &Tokens,
    supplier: &dyn KeySupplier,
) -> AuthResult<bool> {
    if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
        return Ok(false);
    }
    let Some(signature) = b64_decode(&tokens.refresh_token) else {
        tracing::warn!(kind = "verification", reason = "malformed refresh token", "Refresh rejected");
        return Ok(false);
    };

    let mut keys = supplier.keys(req, None).await?;
    while let Some(key) = keys.next().await {
        let key = key?;
        if key.key_type() == KeyType::Private || !key.can(KeyUsage::Verify) {
            continue;
        }
        let Some(code) = key.code() else {
            continue;
        };

        if key
            .verify(&code.descriptor(), &signature, tokens.access_token.as_bytes())
            .unwrap_or(false)
        {
            tracing::debug!(kid = ?key.kid(), "Refresh token validated");
            return Ok(true);
        }
    }

    tracing::warn!(kind = "verification", reason = "invalid refresh token", "Refresh rejected");
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::AlgorithmCode;
    use crate::crypto::KeyPair;
    use crate::encoding::b64_encode;
    use crate::supplier::StaticKeys;

    fn request() -> RequestContext {
        RequestContext::from_url("https://addon.example.com/").unwrap()
    }

    fn tokens_signed_by(pair: &KeyPair, access_token: &str) -> Tokens {
        let descriptor = AlgorithmCode::ES256.descriptor();
        let signature = pair
            .private_key
            .sign(&descriptor, access_token.as_bytes())
            .unwrap();
        Tokens {
            access_token: access_token.to_string(),
            refresh_token: b64_encode(signature),
        }
    }

    #[tokio::test]
    async fn test_valid_refresh_token() {
        let pair = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let tokens = tokens_signed_by(&pair, "a.b.c");
        let supplier = StaticKeys::single(pair.public_key.clone());
        assert!(verify_refresh_token(&request(), &tokens, &supplier).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_token_bound_to_access_token() {
        let pair = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let mut tokens = tokens_signed_by(&pair, "a.b.c");
        tokens.access_token = "a.b.d".to_string();
        let supplier = StaticKeys::single(pair.public_key.clone());
        assert!(!verify_refresh_token(&request(), &tokens, &supplier).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_key_and_empty_tokens() {
        let signer = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let other = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let tokens = tokens_signed_by(&signer, "a.b.c");
        let supplier = StaticKeys::single(other.public_key.clone());
        assert!(!verify_refresh_token(&request(), &tokens, &supplier).await.unwrap());

        let empty = Tokens {
            access_token: String::new(),
            refresh_token: String::new(),
        };
        assert!(!verify_refresh_token(&request(), &empty, &supplier).await.unwrap());
    }
}
