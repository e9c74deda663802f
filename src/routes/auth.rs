/// Authentication routes
///
/// Registration, login, token refresh, logout, and current-user lookup.
/// Access tokens travel in response bodies and Authorization headers;
/// the refresh token travels only in an HttpOnly cookie that page
/// scripts and API clients never read directly.

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    authenticate, generate_access_token, generate_refresh_token, hash_password,
    validate_refresh_token, verify_password,
};
use crate::configuration::{ApplicationSettings, JwtSettings};
use crate::error::{AppError, AuthError};
use crate::validators::{is_valid_email, is_valid_name};

pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public user record - never includes the password hash.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

/// Session response carrying the access token. The refresh token is
/// delivered separately as a Set-Cookie header, never in this body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserResponse,
    pub access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Build the refresh cookie: HttpOnly, SameSite=Strict, path-scoped,
/// Secure only in production so local development over plain HTTP works.
fn refresh_cookie(token: String, max_age_seconds: i64, app: &ApplicationSettings) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, token)
        .http_only(true)
        .secure(app.is_production())
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::seconds(max_age_seconds))
        .finish()
}

/// POST /auth/register
///
/// Create a user and open a session: access token in the body, refresh
/// token in the cookie.
///
/// # Errors
/// - 400: invalid email, name, or password
/// - 409: email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    app_config: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    let name = is_valid_name(&form.name)?;
    let password_hash = hash_password(&form.password)?;

    let user_id = Uuid::new_v4();
    let created_at = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, password_hash, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(&name)
    .bind(&password_hash)
    .bind(created_at)
    .bind(created_at)
    .execute(pool.get_ref())
    .await?;

    let access_token = generate_access_token(&user_id, &email, jwt_config.get_ref())?;
    let refresh_token = generate_refresh_token(&user_id, jwt_config.get_ref())?;

    tracing::info!(user_id = %user_id, "User registered successfully");

    Ok(HttpResponse::Created()
        .cookie(refresh_cookie(
            refresh_token,
            jwt_config.refresh_token_expiry,
            app_config.get_ref(),
        ))
        .json(SessionResponse {
            user: UserResponse {
                id: user_id.to_string(),
                email,
                name,
                created_at: created_at.to_rfc3339(),
            },
            access_token,
        }))
}

/// POST /auth/login
///
/// Authenticate with email and password.
///
/// # Errors
/// - 400: malformed email
/// - 401: invalid credentials - the same message covers "no such user"
///   and "wrong password" so accounts cannot be enumerated
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    app_config: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;

    let user = sqlx::query_as::<_, (Uuid, String, String, String, chrono::DateTime<Utc>)>(
        "SELECT id, email, name, password_hash, created_at FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    let (user_id, user_email, user_name, password_hash, created_at) = user;

    if !verify_password(&form.password, &password_hash)? {
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let access_token = generate_access_token(&user_id, &user_email, jwt_config.get_ref())?;
    let refresh_token = generate_refresh_token(&user_id, jwt_config.get_ref())?;

    tracing::info!(user_id = %user_id, "User logged in successfully");

    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie(
            refresh_token,
            jwt_config.refresh_token_expiry,
            app_config.get_ref(),
        ))
        .json(SessionResponse {
            user: UserResponse {
                id: user_id.to_string(),
                email: user_email,
                name: user_name,
                created_at: created_at.to_rfc3339(),
            },
            access_token,
        }))
}

/// POST /auth/refresh
///
/// Exchange the refresh cookie for a new access token. The cookie itself
/// is not rotated: the token minted at login stays valid until its
/// absolute seven-day expiry or logout.
///
/// # Errors
/// - 401: missing, malformed, or expired refresh cookie
pub async fn refresh(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let cookie = req
        .cookie(REFRESH_COOKIE)
        .ok_or(AppError::Auth(AuthError::InvalidRefreshToken))?;

    let claims = validate_refresh_token(cookie.value(), jwt_config.get_ref())?;
    let user_id = claims.user_id()?;

    // The new access token carries the email claim, which the refresh
    // token does not.
    let user_email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidRefreshToken))?;

    let access_token = generate_access_token(&user_id, &user_email, jwt_config.get_ref())?;

    tracing::info!(user_id = %user_id, "Access token refreshed");

    Ok(HttpResponse::Ok().json(RefreshResponse { access_token }))
}

/// POST /auth/logout
///
/// Clear the refresh cookie. Idempotent; succeeds whether or not a
/// session exists.
pub async fn logout(app_config: web::Data<ApplicationSettings>) -> HttpResponse {
    let expired = Cookie::build(REFRESH_COOKIE, "")
        .http_only(true)
        .secure(app_config.is_production())
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::seconds(0))
        .finish();

    HttpResponse::Ok()
        .cookie(expired)
        .json(serde_json::json!({ "message": "Logged out successfully" }))
}

/// GET /auth/me
///
/// Return the authenticated user's public record.
///
/// # Errors
/// - 401: missing or invalid access token
/// - 404: token subject no longer exists
pub async fn get_current_user(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, jwt_config.get_ref())?;
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, (Uuid, String, String, chrono::DateTime<Utc>)>(
        "SELECT id, email, name, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or(AppError::Database(crate::error::DatabaseError::NotFound(
        "User not found".to_string(),
    )))?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: user.0.to_string(),
        email: user.1,
        name: user.2,
        created_at: user.3.to_rfc3339(),
    }))
}
