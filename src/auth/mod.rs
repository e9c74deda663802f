/// Authentication module
///
/// Token codec, credential hashing, and the per-request authorization
/// check shared by protected handlers.

mod claims;
mod extract;
mod jwt;
mod password;

pub use claims::AccessClaims;
pub use claims::RefreshClaims;
pub use extract::authenticate;
pub use jwt::generate_access_token;
pub use jwt::generate_refresh_token;
pub use jwt::validate_access_token;
pub use jwt::validate_refresh_token;
pub use password::hash_password;
pub use password::verify_password;
