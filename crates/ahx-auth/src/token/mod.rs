//! Compact token issuing and verification.
//!
//! Tokens use the compact serialization
//! `base64url(header).base64url(payload).base64url(signature)` with unpadded
//! segments. The signature covers the UTF-8 bytes of `header.payload`.
//!
//! - [`create_token`] / [`create_tokens`] - issue a token (and refresh token)
//! - [`verify_token`] - check a token against the keys of a [`KeySupplier`]
//! - [`verify_refresh_token`] - check a refresh token against its access token
//! - [`decode_token_payload`] - read claims without checking the signature
//!
//! [`KeySupplier`]: crate::supplier::KeySupplier

pub mod create;
pub mod jti;
pub mod refresh;
pub mod types;
pub mod verify;

pub use create::{CreateTokenOptions, create_token, create_tokens};
pub use jti::generate_jti;
pub use refresh::verify_refresh_token;
pub use types::{JwtClaims, JwtHeader, MAX_SAFE_INTEGER, Tokens, VerifyMode};
pub use verify::{decode_token_header, decode_token_payload, verify_token};

use time::OffsetDateTime;

/// Current time in whole seconds since the epoch.
pub(crate) fn now_seconds() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
