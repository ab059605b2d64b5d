//! HMAC-SHA256 request signing.
//!
//! The signature covers the decimal Unix timestamp immediately followed by the
//! raw request body (no separator), keyed with the receiver's API key, and is
//! sent as lowercase hex.

use crate::error::{ProtocolError, ProtocolResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the shared API key.
pub const HEADER_API_KEY: &str = "X-API-Key";
/// Header carrying the request signature.
pub const HEADER_SIGNATURE: &str = "X-Signature";
/// Header carrying the signing timestamp (Unix seconds).
pub const HEADER_TIMESTAMP: &str = "X-Timestamp";

/// Computes the hex signature for a request.
pub fn sign_request(key: &str, timestamp: &str, body: &[u8]) -> ProtocolResult<String> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| ProtocolError::Signing(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a presented signature in constant time.
pub fn verify_signature(key: &str, timestamp: &str, body: &[u8], presented: &str) -> bool {
    match sign_request(key, timestamp, body) {
        Ok(expected) => expected.as_bytes().ct_eq(presented.as_bytes()).into(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_hex_sha256() {
        let sig = sign_request("secret", "1700000000", b"{}").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn covers_timestamp_and_body() {
        let base = sign_request("secret", "1700000000", b"payload").unwrap();
        assert_ne!(base, sign_request("secret", "1700000001", b"payload").unwrap());
        assert_ne!(base, sign_request("secret", "1700000000", b"payload2").unwrap());
        assert_ne!(base, sign_request("other", "1700000000", b"payload").unwrap());
    }

    #[test]
    fn concatenation_without_separator() {
        // "17" + "00payload" and "1700" + "payload" sign the same bytes
        assert_eq!(
            sign_request("k", "17", b"00payload").unwrap(),
            sign_request("k", "1700", b"payload").unwrap()
        );
    }

    #[test]
    fn verify() {
        let sig = sign_request("secret", "1700000000", b"body").unwrap();
        assert!(verify_signature("secret", "1700000000", b"body", &sig));
        assert!(!verify_signature("secret", "1700000000", b"body", "deadbeef"));
        assert!(!verify_signature("secret", "1700000000", b"body", &sig.to_uppercase()));
    }

    #[test]
    fn empty_key_signs_without_error() {
        let sig = sign_request("", "1700000000", b"body").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify_signature("", "1700000000", b"body", &sig));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn own_signature_verifies(key in "[a-zA-Z0-9]{1,40}", ts in 0u64..4_000_000_000, body in proptest::collection::vec(any::<u8>(), 0..512)) {
                let ts = ts.to_string();
                let sig = sign_request(&key, &ts, &body).unwrap();
                prop_assert!(verify_signature(&key, &ts, &body, &sig));
            }

            #[test]
            fn flipped_body_byte_fails(body in proptest::collection::vec(any::<u8>(), 1..256), idx in any::<proptest::sample::Index>()) {
                let sig = sign_request("k", "1700000000", &body).unwrap();
                let mut tampered = body.clone();
                let i = idx.index(tampered.len());
                tampered[i] ^= 0x01;
                prop_assert!(!verify_signature("k", "1700000000", &tampered, &sig));
            }
        }
    }
}
