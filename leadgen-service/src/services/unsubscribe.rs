//! Signed unsubscribe links.
//!
//! The token is an HMAC over the normalized address, so a link cannot be
//! forged for someone else's address and needs no server-side storage.

use crate::models::normalize_email;
use serde::Serialize;
use service_core::error::AppError;
use service_core::utils::signature;

fn payload(email: &str) -> String {
    format!("unsubscribe:{}", normalize_email(email))
}

pub fn unsubscribe_token(secret: &str, email: &str) -> Result<String, AppError> {
    Ok(signature::sign(secret, &payload(email))?)
}

/// False for a wrong or malformed token. Only key setup problems are errors.
pub fn verify_unsubscribe_token(secret: &str, email: &str, token: &str) -> Result<bool, AppError> {
    Ok(signature::verify(secret, &payload(email), token)?)
}

#[derive(Serialize)]
struct UnsubscribeQuery<'a> {
    email: &'a str,
    token: &'a str,
}

pub fn unsubscribe_url(base_url: &str, secret: &str, email: &str) -> Result<String, AppError> {
    let email = normalize_email(email);
    let token = unsubscribe_token(secret, &email)?;
    let query = serde_urlencoded::to_string(UnsubscribeQuery {
        email: &email,
        token: &token,
    })
    .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode query: {}", e)))?;

    Ok(format!(
        "{}/unsubscribe?{}",
        base_url.trim_end_matches('/'),
        query
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_ignores_case_and_whitespace() {
        let token = unsubscribe_token(SECRET, "Jane@Example.com").unwrap();
        assert!(verify_unsubscribe_token(SECRET, " jane@example.com", &token).unwrap());
        assert!(verify_unsubscribe_token(SECRET, "jane@example.com", &token.to_uppercase()).unwrap());
    }

    #[test]
    fn token_is_bound_to_address_and_secret() {
        let token = unsubscribe_token(SECRET, "jane@example.com").unwrap();
        assert!(!verify_unsubscribe_token(SECRET, "john@example.com", &token).unwrap());
        assert!(!verify_unsubscribe_token("other", "jane@example.com", &token).unwrap());
        assert!(!verify_unsubscribe_token(SECRET, "jane@example.com", "abc").unwrap());
        assert!(!verify_unsubscribe_token(SECRET, "jane@example.com", "").unwrap());
    }

    #[test]
    fn url_encodes_query() {
        let url = unsubscribe_url("https://acme.test/", SECRET, "Jane+news@Example.com").unwrap();
        let token = unsubscribe_token(SECRET, "jane+news@example.com").unwrap();

        assert_eq!(
            url,
            format!(
                "https://acme.test/unsubscribe?email=jane%2Bnews%40example.com&token={}",
                token
            )
        );
    }
}
