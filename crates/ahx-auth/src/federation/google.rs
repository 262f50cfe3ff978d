//! Google ID token verification.
//!
//! Accepts a token only if it verifies against Google's signing keys and
//! its claims satisfy:
//!
//! - `iss` is `accounts.google.com` or `https://accounts.google.com`
//! - `aud` is the configured client id
//! - `hd` matches the configured hosted domain, when one is configured
//! - `email_verified` is true

use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::request::RequestContext;
use crate::supplier::KeySupplier;
use crate::token::{JwtClaims, VerifyMode, verify_token};

/// Issuers Google signs ID tokens as.
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Options for [`verify_google_token`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyGoogleTokenOptions {
    /// OAuth client id the token must be issued to.
    pub client_id: Option<String>,
    /// G Suite hosted domain the account must belong to.
    pub host_domain: Option<String>,
}

impl VerifyGoogleTokenOptions {
    /// Creates options for `client_id`.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            host_domain: None,
        }
    }

    /// Restricts accounts to a hosted domain.
    #[must_use]
    pub fn with_host_domain(mut self, domain: impl Into<String>) -> Self {
        self.host_domain = Some(domain.into());
        self
    }
}

/// Google-specific ID token claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleClaims {
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,

    /// Audience; a string or an array of strings.
    #[serde(default, deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Hosted domain.
    #[serde(default)]
    pub hd: Option<String>,

    /// Email address.
    #[serde(default)]
    pub email: Option<String>,

    /// Whether Google verified the email address.
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub email_verified: bool,

    /// Full name.
    #[serde(default)]
    pub name: Option<String>,

    /// Profile picture URL.
    #[serde(default)]
    pub picture: Option<String>,

    /// Given name.
    #[serde(default)]
    pub given_name: Option<String>,

    /// Family name.
    #[serde(default)]
    pub family_name: Option<String>,
}

/// A verified Google ID token.
#[derive(Debug, Clone)]
pub struct GoogleToken {
    /// All claims of the token.
    pub claims: JwtClaims,
    /// The Google profile claims.
    pub profile: GoogleClaims,
}

/// Verifies a Google ID token against `supplier` (normally
/// [`RemoteJwks::google`](crate::supplier::RemoteJwks::google)).
///
/// Returns `Ok(None)` if there is no token or client id, or if the token is
/// rejected.
///
/// # Errors
///
/// Returns an error if Google's keys cannot be fetched.
pub async fn verify_google_token(
    req: &RequestContext,
    token: Option<&str>,
    options: &VerifyGoogleTokenOptions,
    supplier: &dyn KeySupplier,
) -> AuthResult<Option<GoogleToken>> {
    let (Some(client_id), Some(token)) = (options.client_id.as_deref(), token) else {
        return Ok(None);
    };

    let Some(claims) = verify_token(req, token, supplier, VerifyMode::Access).await? else {
        return Ok(None);
    };

    let profile: GoogleClaims = match claims.deserialize() {
        Ok(profile) => profile,
        Err(e) => {
            reject("malformed claims", &e.to_string());
            return Ok(None);
        }
    };

    let issuer = profile.iss.as_deref().unwrap_or_default();
    if !GOOGLE_ISSUERS.contains(&issuer) {
        reject("invalid issuer", issuer);
        return Ok(None);
    }

    if profile.aud.len() != 1 || profile.aud[0] != client_id {
        reject("invalid audience", &profile.aud.join(","));
        return Ok(None);
    }

    if let Some(domain) = options.host_domain.as_deref()
        && profile.hd.as_deref() != Some(domain)
    {
        reject("invalid domain", profile.hd.as_deref().unwrap_or_default());
        return Ok(None);
    }

    if !profile.email_verified {
        reject("email not verified", profile.email.as_deref().unwrap_or_default());
        return Ok(None);
    }

    tracing::debug!(email = ?profile.email, "Google token validated");
    Ok(Some(GoogleToken { claims, profile }))
}

fn reject(reason: &str, value: &str) {
    tracing::warn!(kind = "verification", reason, value, "Google token rejected");
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(vec![s]),
        OneOrMany::Many(v) => Ok(v),
    }
}

/// Accepts `true`/`false` or the strings `"true"`/`"false"`.
fn deserialize_lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::String(s) => Ok(s == "true"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::AlgorithmCode;
    use crate::crypto::KeyPair;
    use crate::encoding::{b64_encode, encode_json_part};
    use crate::supplier::StaticKeys;
    use serde_json::{Value, json};

    fn request() -> RequestContext {
        RequestContext::from_url("https://addon.example.com/").unwrap()
    }

    fn google_token(pair: &KeyPair, claims: Value) -> String {
        let header = json!({"alg": "ES256", "typ": "JWT", "kid": pair.kid()});
        let input = format!(
            "{}.{}",
            encode_json_part(&header).unwrap(),
            encode_json_part(&claims).unwrap()
        );
        let signature = pair
            .private_key
            .sign(&AlgorithmCode::ES256.descriptor(), input.as_bytes())
            .unwrap();
        format!("{input}.{}", b64_encode(signature))
    }

    fn valid_claims() -> Value {
        json!({
            "iss": "https://accounts.google.com",
            "aud": "client-123",
            "sub": "10769150350006150715113082367",
            "hd": "example.com",
            "email": "jsmith@example.com",
            "email_verified": true,
            "name": "Jane Smith"
        })
    }

    async fn verify(claims: Value, options: &VerifyGoogleTokenOptions) -> Option<GoogleToken> {
        let pair = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let token = google_token(&pair, claims);
        let supplier = StaticKeys::single(pair.public_key.clone());
        verify_google_token(&request(), Some(&token), options, &supplier)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_google_token() {
        let options = VerifyGoogleTokenOptions::new("client-123").with_host_domain("example.com");
        let token = verify(valid_claims(), &options).await.unwrap();
        assert_eq!(token.profile.email.as_deref(), Some("jsmith@example.com"));
        assert_eq!(token.profile.name.as_deref(), Some("Jane Smith"));
        assert_eq!(token.claims.sub(), Some("10769150350006150715113082367"));
    }

    #[tokio::test]
    async fn test_bare_issuer_accepted() {
        let mut claims = valid_claims();
        claims["iss"] = json!("accounts.google.com");
        let options = VerifyGoogleTokenOptions::new("client-123");
        assert!(verify(claims, &options).await.is_some());
    }

    #[tokio::test]
    async fn test_claim_checks() {
        let options = VerifyGoogleTokenOptions::new("client-123").with_host_domain("example.com");
        let cases = [
            ("iss", json!("https://evil.example.com")),
            ("aud", json!("other-client")),
            ("aud", json!(["client-123", "other-client"])),
            ("hd", json!("other.com")),
            ("email_verified", json!(false)),
            ("email_verified", json!("false")),
        ];

        for (claim, value) in cases {
            let mut claims = valid_claims();
            claims[claim] = value.clone();
            assert!(
                verify(claims, &options).await.is_none(),
                "accepted {claim} = {value}"
            );
        }
    }

    #[tokio::test]
    async fn test_string_email_verified() {
        let mut claims = valid_claims();
        claims["email_verified"] = json!("true");
        let options = VerifyGoogleTokenOptions::new("client-123");
        assert!(verify(claims, &options).await.is_some());
    }

    #[tokio::test]
    async fn test_missing_token_or_client_id() {
        let supplier = StaticKeys::default();
        let result = verify_google_token(
            &request(),
            None,
            &VerifyGoogleTokenOptions::new("client-123"),
            &supplier,
        )
        .await
        .unwrap();
        assert!(result.is_none());

        assert!(verify(valid_claims(), &VerifyGoogleTokenOptions::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let signer = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let other = KeyPair::generate(AlgorithmCode::ES256, 0).unwrap();
        let token = google_token(&signer, valid_claims());
        let supplier = StaticKeys::single(other.public_key.clone());
        let result = verify_google_token(
            &request(),
            Some(&token),
            &VerifyGoogleTokenOptions::new("client-123"),
            &supplier,
        )
        .await
        .unwrap();
        assert!(result.is_none());
    }
}
