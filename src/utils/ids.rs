//! Textual encoding of group, device and event identifiers.
//!
//! The local store addresses records by the unpadded URL-safe base64 form of
//! the raw public keys and event ids handed out by the protocol service.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Encode raw key bytes into the store's textual form.
pub fn encode_pk(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a textual key back into raw bytes.
pub fn decode_pk(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(encoded)
}
