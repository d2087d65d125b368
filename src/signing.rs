//! HMAC-SHA256 payload signing.
//!
//! The signature is computed over the exact body bytes that go on the
//! wire. Retries re-send the same bytes, so a receiver can verify a
//! resend against the signature it already saw.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the HMAC-SHA256 of `body` as lowercase hex.
pub fn compute_signature(secret: &[u8], body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .unwrap_or_else(|_| Hmac::<Sha256>::new_from_slice(b"default").expect("hmac"));
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Value of the signature header: `sha256=<hex>`.
pub fn signature_header_value(secret: &[u8], body: &[u8]) -> String {
    format!("{SIGNATURE_PREFIX}{}", compute_signature(secret, body))
}

/// Verify a received `X-Webhook-Signature` value against the body.
///
/// Accepts the value with or without the `sha256=` prefix.
pub fn verify_signature(secret: &[u8], body: &[u8], header_value: &str) -> bool {
    let hex_part = header_value
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(header_value);

    let Ok(signature) = hex::decode(hex_part) else {
        return false;
    };

    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .unwrap_or_else(|_| Hmac::<Sha256>::new_from_slice(b"default").expect("hmac"));
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}
