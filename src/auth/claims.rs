/// JWT claim sets
///
/// Payloads for the two token kinds. Access tokens carry the subject and
/// email for a short window; refresh tokens carry the subject alone for
/// seven days and travel only inside the HttpOnly cookie.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

/// Claims for short-lived access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// User email
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl AccessClaims {
    pub fn new(user_id: Uuid, email: String, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            email,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Extract the subject as a UUID.
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenInvalid))
    }
}

/// Claims for long-lived refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl RefreshClaims {
    pub fn new(user_id: Uuid, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::InvalidRefreshToken))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_claims_carry_subject_and_email() {
        let user_id = Uuid::new_v4();
        let claims = AccessClaims::new(user_id, "test@example.com".to_string(), 900, "test".to_string());

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn user_id_extraction_roundtrips() {
        let user_id = Uuid::new_v4();
        let claims = AccessClaims::new(user_id, "test@example.com".to_string(), 900, "test".to_string());

        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn invalid_subject_is_rejected() {
        let mut claims = AccessClaims::new(
            Uuid::new_v4(),
            "test@example.com".to_string(),
            900,
            "test".to_string(),
        );
        claims.sub = "not-a-uuid".to_string();

        assert!(claims.user_id().is_err());
    }

    #[test]
    fn refresh_claims_have_no_email() {
        let user_id = Uuid::new_v4();
        let claims = RefreshClaims::new(user_id, 604800, "test".to_string());

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.exp - claims.iat, 604800);
    }
}
