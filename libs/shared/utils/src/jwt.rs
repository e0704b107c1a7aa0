use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{JwtClaims, User};

/// Signs an HS256 token for `user` valid for `ttl_hours`.
pub fn issue_token(user: &User, jwt_secret: &str, ttl_hours: i64) -> Result<(String, DateTime<Utc>), String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let expires_at = now + Duration::hours(ttl_hours);
    let claims = JwtClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to sign token: {}", e))?;

    Ok((token, expires_at))
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        match e.kind() {
            ErrorKind::ExpiredSignature => "Token expired".to_string(),
            ErrorKind::InvalidSignature => "Invalid token signature".to_string(),
            _ => "Invalid token format".to_string(),
        }
    })?;

    let claims = data.claims;
    let id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid token subject".to_string())?;

    let user = User {
        id,
        email: claims.email,
        role: claims.role,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::auth::Role;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "doc@example.com".to_string(),
            role: Role::Doctor,
        }
    }

    #[test]
    fn issued_token_validates() {
        let u = user();
        let (token, expires_at) = issue_token(&u, "secret", 1).unwrap();
        assert!(expires_at > Utc::now());
        assert_eq!(validate_token(&token, "secret").unwrap(), u);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = issue_token(&user(), "secret", 1).unwrap();
        assert_eq!(validate_token(&token, "other").unwrap_err(), "Invalid token signature");
    }

    #[test]
    fn expired_token_is_rejected() {
        let (token, _) = issue_token(&user(), "secret", -2).unwrap();
        assert_eq!(validate_token(&token, "secret").unwrap_err(), "Token expired");
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(issue_token(&user(), "", 1).is_err());
        assert!(validate_token("a.b.c", "").is_err());
    }
}
