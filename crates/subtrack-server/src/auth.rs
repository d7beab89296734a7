//! Bearer token issuing and verification (HS256 JWT)

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use subtrack_core::models::User;

/// Authenticated user, inserted into request extensions by the auth middleware
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id as a string
    sub: String,
    exp: i64,
    iat: i64,
}

/// Issue a token for `user_id` valid for `ttl_hours`
pub fn issue_token(user_id: i64, secret: &str, ttl_hours: i64) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Verify signature and expiry, returning the user id
pub fn verify_token(token: &str, secret: &str) -> anyhow::Result<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    let user_id = data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|_| anyhow::anyhow!("Token subject is not a user id"))?;
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let token = issue_token(42, "secret", 1).unwrap();
        assert_eq!(verify_token(&token, "secret").unwrap(), 42);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(42, "secret", 1).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token(42, "secret", -1).unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(verify_token("not-a-jwt", "secret").is_err());
    }
}
