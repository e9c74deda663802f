/// Token codec
///
/// Signs and verifies both token kinds with HS256 and a single shared
/// secret. Verification checks expiry against wall-clock time with zero
/// leeway; no clock-skew compensation is applied.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConfigError};

fn sign<C: Serialize>(claims: &C, config: &JwtSettings) -> Result<String, AppError> {
    if config.secret.is_empty() {
        return Err(AppError::Config(ConfigError::MissingRequired(
            "jwt.secret".to_string(),
        )));
    }

    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

fn verify<C: DeserializeOwned>(token: &str, config: &JwtSettings) -> Result<C, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    decode::<C>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// Mint a short-lived access token for a user.
pub fn generate_access_token(
    user_id: &Uuid,
    email: &str,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = AccessClaims::new(
        *user_id,
        email.to_string(),
        config.access_token_expiry,
        config.issuer.clone(),
    );
    sign(&claims, config)
}

/// Mint a long-lived refresh token for a user.
///
/// The caller is responsible for delivering this only via the HttpOnly
/// cookie; it must never appear in a response body.
pub fn generate_refresh_token(user_id: &Uuid, config: &JwtSettings) -> Result<String, AppError> {
    let claims = RefreshClaims::new(*user_id, config.refresh_token_expiry, config.issuer.clone());
    sign(&claims, config)
}

/// Validate an access token and extract its claims.
///
/// Malformed, tampered, expired, and wrong-issuer tokens all surface the
/// same authorization failure.
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<AccessClaims, AppError> {
    verify(token, config).map_err(|e| {
        tracing::warn!("Access token validation failed: {}", e);
        AppError::Auth(AuthError::TokenInvalid)
    })
}

/// Validate a refresh token and extract its claims.
pub fn validate_refresh_token(
    token: &str,
    config: &JwtSettings,
) -> Result<RefreshClaims, AppError> {
    verify(token, config).map_err(|e| {
        tracing::warn!("Refresh token validation failed: {}", e);
        AppError::Auth(AuthError::InvalidRefreshToken)
    })
}
