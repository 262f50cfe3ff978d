//! Tokens issued by external identity providers.
//!
//! - [`google`] - Google Sign-In ID tokens, verified against Google's JWKS

pub mod google;

pub use google::{
    GOOGLE_ISSUERS, GoogleClaims, GoogleToken, VerifyGoogleTokenOptions, verify_google_token,
};
