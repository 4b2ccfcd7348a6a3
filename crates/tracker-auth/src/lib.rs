//! Tracker Auth: password hashing, signed tokens, two-factor codes,
//! phone-number encryption, request gates and permission resolution.

pub mod config;
pub mod crypto;
pub mod error;
pub mod gates;
pub mod password;
pub mod permission;
pub mod tfa;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use permission::PermissionResolver;
pub use token::AccessTokenClaims;
