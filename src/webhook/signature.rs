//! Webhook request signing
//!
//! The chat platform signs each delivery with HMAC-SHA256 over
//! `"v0:<timestamp>:<body>"` using the shared signing secret, and sends the
//! result as `v0=<hex>`. Verification recomputes the digest and compares in
//! constant time; the timestamp must also fall within the freshness window.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the expected signature header value for a request body.
pub fn compute_signature(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a provided signature header against the request body.
pub fn verify_signature(secret: &str, timestamp: i64, body: &[u8], provided: &str) -> bool {
    let expected = compute_signature(secret, timestamp, body);
    constant_time_eq(&expected, provided)
}

/// Check the timestamp against the freshness window, in either direction
/// (client clocks can run ahead as well as behind).
pub fn timestamp_is_fresh(timestamp: i64, now: i64, window_secs: u64) -> bool {
    now.abs_diff(timestamp) <= window_secs
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
