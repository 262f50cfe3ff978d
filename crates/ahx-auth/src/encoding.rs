//! Unpadded base64url helpers for compact token segments.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub(crate) fn b64_encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn b64_decode(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment).ok()
}

/// Serializes `value` as JSON and encodes it as one token segment.
pub(crate) fn encode_json_part<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(b64_encode(serde_json::to_vec(value)?))
}

/// Decodes one token segment as JSON. Bad base64 or JSON yields `None`.
pub(crate) fn decode_json_part<T: DeserializeOwned>(segment: &str) -> Option<T> {
    serde_json::from_slice(&b64_decode(segment)?).ok()
}
