//! CSRF `state` generation and comparison.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Bytes of entropy in each generated state.
pub const STATE_BYTES: usize = 32;

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut state_bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut state_bytes);
    URL_SAFE_NO_PAD.encode(state_bytes)
}

/// Compare a received state against the stored one in constant time.
///
/// A missing stored state never matches.
pub fn states_match(expected: Option<&str>, received: &str) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    expected.as_bytes().ct_eq(received.as_bytes()).into()
}
