//! Secret generation and display masking.

use base64::Engine;
use rand::RngCore;
use uuid::Uuid;

/// Generate a client secret with 256 bits of entropy, URL- and header-safe
/// (unpadded URL-safe base64).
pub fn generate_client_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate an opaque, globally unique client id. Uniqueness is enforced by
/// the storage index, not here.
pub fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate an opaque session token. The token carries no payload; it is
/// only a key into the session backend.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Mask a secret for display: keep the last 4 characters, replace the rest
/// with `*`. Values shorter than 4 characters collapse to `"****"`.
///
/// Only ever applied to plaintext already decrypted in-process.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 4 {
        return "****".to_string();
    }
    let masked_len = chars.len() - 4;
    let mut out = "*".repeat(masked_len);
    out.extend(&chars[masked_len..]);
    out
}
