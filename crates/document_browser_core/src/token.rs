//! crates/document_browser_core/src/token.rs
//!
//! Opaque random values used for session tokens and OAuth CSRF state.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes behind every token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Draws `TOKEN_BYTES` from the operating system RNG and encodes them URL-safe.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
