//! Signed EdDSA tokens: access, refresh, two-factor authenticate and
//! invite sign-up tokens share one key pair and are told apart by the
//! `kind` claim.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracker_core::models::permission::Permission;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    Authenticate,
    SignUp,
    Verify,
}

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: user key (UUID string).
    pub sub: String,
    pub kind: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

/// Claims of a refresh token. `refresh_id` must match the id stored on
/// the user record for the token to be accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub kind: TokenKind,
    pub refresh_id: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Short-lived token handed out by sign-in when a two-factor code was
/// sent; exchanged for real tokens by `authenticate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateTokenClaims {
    pub sub: String,
    pub kind: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Invite token mailed to someone without an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpTokenClaims {
    pub user_name: String,
    pub org_key: Uuid,
    pub requested_role: Permission,
    pub kind: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

fn encode<T: Serialize>(claims: &T, config: &AuthConfig) -> Result<String, AuthError> {
    let key = EncodingKey::from_ed_pem(config.jwt_private_key_pem.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("bad private key: {e}")))?;

    let header = Header::new(Algorithm::EdDSA);
    jsonwebtoken::encode(&header, claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

fn decode<T: DeserializeOwned>(
    token: &str,
    config: &AuthConfig,
    required: &[&str],
) -> Result<T, AuthError> {
    let key = DecodingKey::from_ed_pem(config.jwt_public_key_pem.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("bad public key: {e}")))?;

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_required_spec_claims(required);

    jsonwebtoken::decode::<T>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
}

fn expect_kind(actual: TokenKind, expected: TokenKind) -> Result<(), AuthError> {
    if actual == expected {
        Ok(())
    } else {
        Err(AuthError::TokenInvalid(format!(
            "expected {expected:?} token, got {actual:?}"
        )))
    }
}

fn parse_subject(sub: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(sub).map_err(|e| AuthError::TokenInvalid(format!("bad subject: {e}")))
}

/// Issue a signed EdDSA (Ed25519) JWT access token.
pub fn issue_access_token(user_key: Uuid, config: &AuthConfig) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = AccessTokenClaims {
        sub: user_key.to_string(),
        kind: TokenKind::Access,
        iss: config.jwt_issuer.clone(),
        iat: now,
        exp: now + config.access_token_lifetime_secs as i64,
        jti: Uuid::new_v4().to_string(),
    };
    encode(&claims, config)
}

/// Decode and verify an EdDSA JWT access token.
pub fn decode_access_token(
    token: &str,
    config: &AuthConfig,
) -> Result<AccessTokenClaims, AuthError> {
    let claims: AccessTokenClaims = decode(token, config, &["sub", "exp", "iat", "iss"])?;
    expect_kind(claims.kind, TokenKind::Access)?;
    Ok(claims)
}

/// Resolve the caller's key from an `Authorization` header value.
///
/// An absent header is an anonymous request (`Ok(None)`); a present but
/// malformed, expired or forged header is an error.
pub fn authenticate_bearer(
    header: Option<&str>,
    config: &AuthConfig,
) -> Result<Option<Uuid>, AuthError> {
    let Some(header) = header.map(str::trim).filter(|h| !h.is_empty()) else {
        return Ok(None);
    };
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .unwrap_or(header)
        .trim();
    let claims = decode_access_token(token, config)?;
    parse_subject(&claims.sub).map(Some)
}

/// Issue a refresh token bound to `refresh_id`, valid for `lifetime_secs`.
pub fn issue_refresh_token(
    user_key: Uuid,
    refresh_id: &str,
    lifetime_secs: u64,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = RefreshTokenClaims {
        sub: user_key.to_string(),
        kind: TokenKind::Refresh,
        refresh_id: refresh_id.to_owned(),
        iss: config.jwt_issuer.clone(),
        iat: now,
        exp: now + lifetime_secs as i64,
    };
    encode(&claims, config)
}

pub fn decode_refresh_token(
    token: &str,
    config: &AuthConfig,
) -> Result<(Uuid, RefreshTokenClaims), AuthError> {
    let claims: RefreshTokenClaims = decode(token, config, &["sub", "exp", "iss"])?;
    expect_kind(claims.kind, TokenKind::Refresh)?;
    Ok((parse_subject(&claims.sub)?, claims))
}

pub fn issue_authenticate_token(user_key: Uuid, config: &AuthConfig) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = AuthenticateTokenClaims {
        sub: user_key.to_string(),
        kind: TokenKind::Authenticate,
        iss: config.jwt_issuer.clone(),
        iat: now,
        exp: now + config.authenticate_token_lifetime_secs as i64,
    };
    encode(&claims, config)
}

/// Returns the user key the authenticate token was issued for.
pub fn decode_authenticate_token(token: &str, config: &AuthConfig) -> Result<Uuid, AuthError> {
    let claims: AuthenticateTokenClaims = decode(token, config, &["sub", "exp", "iss"])?;
    expect_kind(claims.kind, TokenKind::Authenticate)?;
    parse_subject(&claims.sub)
}

/// Token mailed after sign-up to prove ownership of the email address.
pub fn issue_verify_token(user_key: Uuid, config: &AuthConfig) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = AuthenticateTokenClaims {
        sub: user_key.to_string(),
        kind: TokenKind::Verify,
        iss: config.jwt_issuer.clone(),
        iat: now,
        exp: now + config.sign_up_token_lifetime_secs as i64,
    };
    encode(&claims, config)
}

pub fn decode_verify_token(token: &str, config: &AuthConfig) -> Result<Uuid, AuthError> {
    let claims: AuthenticateTokenClaims = decode(token, config, &["sub", "exp", "iss"])?;
    expect_kind(claims.kind, TokenKind::Verify)?;
    parse_subject(&claims.sub)
}

pub fn issue_sign_up_token(
    user_name: &str,
    org_key: Uuid,
    requested_role: Permission,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = SignUpTokenClaims {
        user_name: user_name.to_lowercase(),
        org_key,
        requested_role,
        kind: TokenKind::SignUp,
        iss: config.jwt_issuer.clone(),
        iat: now,
        exp: now + config.sign_up_token_lifetime_secs as i64,
    };
    encode(&claims, config)
}

pub fn decode_sign_up_token(
    token: &str,
    config: &AuthConfig,
) -> Result<SignUpTokenClaims, AuthError> {
    let claims: SignUpTokenClaims = decode(token, config, &["exp", "iss"])?;
    expect_kind(claims.kind, TokenKind::SignUp)?;
    Ok(claims)
}

/// Generate a random refresh-session id
/// (32 bytes, base64url-encoded without padding).
pub fn generate_refresh_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}
