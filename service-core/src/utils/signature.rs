use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Generate a hex encoded HMAC-SHA256 signature of `payload`.
pub fn sign(secret: &str, payload: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    mac.update(payload.as_bytes());
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Verify a signature produced by [`sign`] using constant-time comparison.
pub fn verify(secret: &str, payload: &str, signature: &str) -> Result<bool, anyhow::Error> {
    let expected_signature = sign(secret, payload)?;

    let expected_bytes = expected_signature.as_bytes();
    let signature_bytes = signature.trim().to_ascii_lowercase();
    let signature_bytes = signature_bytes.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_generation_and_verification() {
        let signature = sign("my_secret_key", "unsubscribe:jane@example.com").unwrap();
        assert_eq!(signature.len(), 64);

        assert!(verify("my_secret_key", "unsubscribe:jane@example.com", &signature).unwrap());
        assert!(
            verify(
                "my_secret_key",
                "unsubscribe:jane@example.com",
                &signature.to_uppercase()
            )
            .unwrap()
        );
    }

    #[test]
    fn test_invalid_signature() {
        let signature = sign("my_secret_key", "unsubscribe:jane@example.com").unwrap();

        assert!(!verify("other_key", "unsubscribe:jane@example.com", &signature).unwrap());
        assert!(!verify("my_secret_key", "unsubscribe:john@example.com", &signature).unwrap());
        assert!(!verify("my_secret_key", "unsubscribe:jane@example.com", "abc").unwrap());
    }
}
