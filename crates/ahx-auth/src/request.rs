//! The request a token operation is performed on behalf of.

use axum::http::header::{AUTHORIZATION, HOST};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method};
use url::Url;

/// Minimal view of an incoming HTTP request.
///
/// Token issuing derives the `iss` claim from the request host; key suppliers
/// receive it so they can select keys per tenant or origin.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
}

impl RequestContext {
    /// Creates a context for a `GET` of `url` with no headers.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Parses `url` into a `GET` context.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute URL.
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// Builds a context from the parts of an HTTP request.
    ///
    /// Server-side request URIs are usually origin-form (`/path?query`), so
    /// the absolute URL is rebuilt from the `Host` header and `scheme`.
    ///
    /// # Errors
    ///
    /// Returns an error if no valid absolute URL can be formed.
    pub fn from_parts(parts: &Parts, scheme: &str) -> Result<Self, url::ParseError> {
        let url = if parts.uri.scheme().is_some() {
            Url::parse(&parts.uri.to_string())?
        } else {
            let host = parts
                .headers
                .get(HOST)
                .and_then(|h| h.to_str().ok())
                .or_else(|| parts.uri.authority().map(|a| a.as_str()))
                .unwrap_or("localhost");
            let path = parts
                .uri
                .path_and_query()
                .map_or("/", |p| p.as_str());
            Url::parse(&format!("{scheme}://{host}{path}"))?
        };

        Ok(Self {
            method: parts.method.clone(),
            url,
            headers: parts.headers.clone(),
        })
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: axum::http::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the host and non-default port, as used for the `iss` claim.
    #[must_use]
    pub fn host(&self) -> String {
        match (self.url.host_str(), self.url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        }
    }

    /// Returns the credential of an `Authorization: Bearer <token>` header.
    ///
    /// The scheme is matched case-insensitively; an empty credential yields
    /// `None`.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, credential) = value.split_once(' ').unwrap_or((value, ""));
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let credential = credential.split(' ').next().unwrap_or_default();
        (!credential.is_empty()).then_some(credential)
    }
}
