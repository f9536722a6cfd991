//! Typeform webhook signature verification.
//!
//! Typeform signs the raw request body with HMAC-SHA256 keyed by the
//! webhook secret and sends `sha256=<base64 digest>` in the
//! `Typeform-Signature` header.
//! Reference: https://www.typeform.com/developers/webhooks/secure-your-webhooks/

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "Typeform-Signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the signature Typeform would send for `payload`.
///
/// Returns `None` if the HMAC cannot be keyed with `secret`.
pub fn compute_signature(secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    let digest = mac.finalize().into_bytes();

    Some(format!("{}{}", SIGNATURE_PREFIX, STANDARD.encode(digest)))
}

/// Verify a Typeform webhook signature.
///
/// # Arguments
///
/// * `secret` - The webhook secret configured on the Typeform side
/// * `payload` - The raw request body, exactly as received
/// * `received` - The `Typeform-Signature` header value, if any
///
/// # Returns
///
/// `true` only if a signature was supplied and it matches the expected one.
pub fn verify_typeform_signature(secret: &str, payload: &[u8], received: Option<&str>) -> bool {
    let received = received.map(str::trim).unwrap_or("");

    if secret.is_empty() || received.is_empty() {
        warn!(
            has_secret = !secret.is_empty(),
            has_signature = !received.is_empty(),
            "typeform_signature_missing_fields"
        );
        return false;
    }

    let Some(expected) = compute_signature(secret, payload) else {
        warn!("typeform_signature_invalid_key");
        return false;
    };

    // ct_eq is false on length mismatch.
    let valid: bool = expected.as_bytes().ct_eq(received.as_bytes()).into();

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = received.len(),
            has_prefix = received.starts_with(SIGNATURE_PREFIX),
            "typeform_signature_mismatch"
        );
    }

    valid
}

/// Check if a usable webhook secret is configured.
pub fn is_signature_verification_enabled(secret: &Option<String>) -> bool {
    secret
        .as_ref()
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-webhook-secret";
    const PAYLOAD: &[u8] = br#"{"event_id":"01HX","form_response":{"form_id":"abc123"}}"#;

    #[test]
    fn test_compute_signature_format() {
        let signature = compute_signature(SECRET, PAYLOAD).unwrap();

        assert!(signature.starts_with("sha256="));
        // 32 byte digest -> 44 base64 chars with padding
        assert_eq!(signature.len(), "sha256=".len() + 44);
        assert!(signature.ends_with('='));
    }

    #[test]
    fn test_compute_signature_known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let signature =
            compute_signature("key", b"The quick brown fox jumps over the lazy dog").unwrap();

        assert_eq!(
            signature,
            "sha256=97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg="
        );
    }

    #[test]
    fn test_verify_signature_valid() {
        let signature = compute_signature(SECRET, PAYLOAD).unwrap();

        assert!(verify_typeform_signature(SECRET, PAYLOAD, Some(&signature)));
    }

    #[test]
    fn test_verify_signature_missing_header() {
        assert!(!verify_typeform_signature(SECRET, PAYLOAD, None));
        assert!(!verify_typeform_signature(SECRET, PAYLOAD, Some("")));
    }

    #[test]
    fn test_verify_signature_empty_secret() {
        let signature = compute_signature("", PAYLOAD).unwrap();

        assert!(!verify_typeform_signature("", PAYLOAD, Some(&signature)));
    }

    #[test]
    fn test_verify_signature_wrong_secret() {
        let signature = compute_signature("another-secret", PAYLOAD).unwrap();

        assert!(!verify_typeform_signature(SECRET, PAYLOAD, Some(&signature)));
    }

    #[test]
    fn test_verify_signature_tampered_payload() {
        let signature = compute_signature(SECRET, PAYLOAD).unwrap();
        let tampered = br#"{"event_id":"01HX","form_response":{"form_id":"xyz999"}}"#;

        assert!(!verify_typeform_signature(SECRET, tampered, Some(&signature)));
    }

    #[test]
    fn test_verify_signature_requires_prefix() {
        let signature = compute_signature(SECRET, PAYLOAD).unwrap();
        let bare = signature.trim_start_matches("sha256=");

        assert!(!verify_typeform_signature(SECRET, PAYLOAD, Some(bare)));
    }

    #[test]
    fn test_verify_signature_hex_digest_rejected() {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(PAYLOAD);
        let hex_digest: String = mac
            .finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();

        assert!(!verify_typeform_signature(
            SECRET,
            PAYLOAD,
            Some(&format!("sha256={hex_digest}"))
        ));
    }

    #[test]
    fn test_is_signature_verification_enabled() {
        assert!(!is_signature_verification_enabled(&None));
        assert!(!is_signature_verification_enabled(&Some("".to_string())));
        assert!(!is_signature_verification_enabled(&Some("   ".to_string())));
        assert!(is_signature_verification_enabled(&Some(
            "secret123".to_string()
        )));
    }
}
