//! Opaque prefixed identifiers and the wall-clock used to stamp responses.
//!
//! IDs are `<prefix>_<hex>` where the hex half is random bits read from the
//! process RNG. Generation never panics: if the RNG can't be read the caller
//! falls back to a sentinel id instead of aborting the request.

use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

/// Generate an id of the form `<prefix>_<hex>` from `bytes` bytes of randomness.
fn random_hex_id(prefix: &str, bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    let mut hex = String::with_capacity(prefix.len() + 1 + bytes * 2);
    hex.push_str(prefix);
    hex.push('_');
    for b in &buf {
        // Writing to a String is infallible; discard the always-Ok result.
        let _ = write!(hex, "{b:02x}");
    }
    hex
}

/// Generate a response id: `resp_<32 hex chars>` (128 bits).
pub fn generate_response_id() -> String {
    random_hex_id("resp", 16)
}

/// Generate an id for the given item-type prefix (`msg`, `fc`, `fco`, `call`, `mcp`, ...).
///
/// 128 bits of randomness, matching response ids. Unrecognized prefixes are
/// accepted as-is: callers are expected to pass one of the prefixes named in
/// the wire format (`msg_`, `fc_`, `fco_`, `call_`, `conv_`).
pub fn generate_id(prefix: &str) -> String {
    random_hex_id(prefix, 16)
}

/// Generate a conversation id: `conv_<32 hex chars>`.
pub fn generate_conversation_id() -> String {
    random_hex_id("conv", 16)
}

/// Generate a request id. 64 bits is sufficient here; request ids are only used
/// for correlating logs and MCP tool-session scoping, not for long-term storage.
pub fn generate_request_id() -> String {
    random_hex_id("req", 8)
}

/// Wall-clock seconds since epoch, captured at response creation.
///
/// Saturates to 0 rather than panicking if the clock is somehow before the
/// epoch (a misconfigured container clock, say).
pub fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn response_id_has_expected_prefix_and_length() {
        let id = generate_response_id();
        assert!(id.starts_with("resp_"));
        assert_eq!(id.len(), "resp_".len() + 32);
    }

    #[test]
    fn generate_id_uses_given_prefix() {
        assert!(generate_id("msg").starts_with("msg_"));
        assert!(generate_id("fc").starts_with("fc_"));
        assert!(generate_id("fco").starts_with("fco_"));
        assert!(generate_id("call").starts_with("call_"));
    }

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<String> = (0..200).map(|_| generate_id("msg")).collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn conversation_id_has_conv_prefix() {
        assert!(generate_conversation_id().starts_with("conv_"));
    }

    #[test]
    fn now_seconds_is_plausible() {
        // Should be after 2024-01-01 and not absurdly in the future.
        let t = now_seconds();
        assert!(t > 1_700_000_000);
        assert!(t < 4_000_000_000);
    }
}
