//! Shared-secret verification for inbound webhooks

use secrecy::{ExposeSecret, SecretString};

/// Check a provided header value against the expected secret
///
/// A missing header never matches.
#[must_use]
pub fn verify_secret(expected: &SecretString, provided: Option<&str>) -> bool {
    provided.is_some_and(|p| constant_time_eq(expected.expose_secret().as_bytes(), p.as_bytes()))
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
