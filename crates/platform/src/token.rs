//! Signed Bearer-Token Codec
//!
//! HS256 sign/verify using the `jsonwebtoken` crate. Tokens carry the
//! account id and an expiry, nothing else; the signing key is the hex
//! secret persisted by storage at first boot.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default token lifetime in seconds (12 hours)
pub const TOKEN_TTL_SECS: i64 = 12 * 3600;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    /// Signature mismatch, wrong algorithm, expiry in the past, or an
    /// unparseable payload. Callers respond 401 without distinguishing.
    #[error("token is not valid")]
    Verify(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "UserID")]
    user_id: i64,
    exp: i64,
}

/// Issue a token for `user_id`, valid for [`TOKEN_TTL_SECS`]
pub fn issue(user_id: i64, secret: &str) -> Result<String, TokenError> {
    issue_with_ttl(user_id, secret, Duration::seconds(TOKEN_TTL_SECS))
}

/// Issue a token with an explicit lifetime
pub fn issue_with_ttl(user_id: i64, secret: &str, ttl: Duration) -> Result<String, TokenError> {
    let claims = Claims {
        user_id,
        exp: (Utc::now() + ttl).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(TokenError::Sign)
}

/// Verify a token and return the account id it was issued for
pub fn verify(token: &str, secret: &str) -> Result<i64, TokenError> {
    let validation = Validation::new(Algorithm::HS256);

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(TokenError::Verify)?;

    Ok(data.claims.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "oivohfo8Saelahv2vei8ee8Ighae3ei0";

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let token = issue(100, SECRET).unwrap();
        assert!(token.len() >= 100);
        assert_eq!(token.split('.').count(), 3);

        let user_id = verify(&token, SECRET).unwrap();
        assert_eq!(user_id, 100);
    }

    #[test]
    fn test_wrong_secret_fails() {
        let token = issue(100, SECRET).unwrap();
        assert!(matches!(
            verify(&token, "some-other-secret"),
            Err(TokenError::Verify(_))
        ));
    }

    #[test]
    fn test_expired_token_fails() {
        // Well past any validation leeway
        let token = issue_with_ttl(100, SECRET, Duration::hours(-1)).unwrap();
        assert!(matches!(verify(&token, SECRET), Err(TokenError::Verify(_))));
    }

    #[test]
    fn test_tampered_token_fails() {
        let token = issue(100, SECRET).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        assert!(verify(&tampered, SECRET).is_err());
    }

    #[test]
    fn test_garbage_token_fails() {
        assert!(verify("not.a.token", SECRET).is_err());
        assert!(verify("", SECRET).is_err());
    }
}
