// src/common/random.rs
//! Random string generation for OAuth state values and placeholder credentials.
//!
//! Uses the Crockford Base32 alphabet (no I, L, O, U) so generated values are
//! safe in URLs and cookies without escaping.

use rand::Rng;

/// Crockford Base32 alphabet (excludes I, L, O, U to avoid confusion)
const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Length of the OAuth `state` parameter
pub const OAUTH_STATE_LENGTH: usize = 24;

/// Length of the unusable password assigned to OAuth-only users
pub const PLACEHOLDER_PASSWORD_LENGTH: usize = 48;

fn generate_crockford_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..32);
            CROCKFORD_ALPHABET[idx] as char
        })
        .collect()
}

/// CSRF state for the OAuth authorization redirect
pub fn generate_oauth_state() -> String {
    generate_crockford_string(OAUTH_STATE_LENGTH)
}

/// Random secret nobody knows, hashed and stored for users who only sign in through a provider
pub fn generate_placeholder_password() -> String {
    generate_crockford_string(PLACEHOLDER_PASSWORD_LENGTH)
}
