//! HTTP handlers.
//!
//! # Available Handlers
//!
//! - [`jwks`] - public key set endpoint

mod error;
pub mod jwks;

use axum::Router;
use axum::routing::get;

pub use jwks::{JwksState, jwks_handler};

use crate::keys::KeyManager;

/// Path the JWKS is served at.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Returns a router serving the manager's JWKS at [`JWKS_PATH`].
pub fn jwks_router(keys: KeyManager) -> Router {
    Router::new()
        .route(JWKS_PATH, get(jwks_handler))
        .with_state(JwksState::new(keys))
}
