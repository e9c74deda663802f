/// Request authentication
///
/// The single authorization check shared by every protected handler.
/// Composed explicitly instead of living in middleware so each handler
/// states its own authentication requirement.

use actix_web::HttpRequest;

use crate::auth::claims::AccessClaims;
use crate::auth::jwt::validate_access_token;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Extract and validate the bearer token from the Authorization header.
///
/// Returns the verified claims, or `AuthError::MissingToken` when the
/// header is absent or not in `Bearer <token>` form, and
/// `AuthError::TokenInvalid` when verification fails.
pub fn authenticate(req: &HttpRequest, config: &JwtSettings) -> Result<AccessClaims, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Auth(AuthError::MissingToken))?;

    validate_access_token(token, config)
}
