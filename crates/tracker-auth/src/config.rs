//! Authentication configuration.

/// Configuration for token issuance, password policy and sign-in limits.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key for JWT signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for JWT verification.
    pub jwt_public_key_pem: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh session lifetime in seconds (default: 43_200 = 12 hours).
    pub refresh_token_lifetime_secs: u64,
    /// Refresh session lifetime when the user asked to be remembered
    /// (default: 604_800 = 7 days).
    pub remember_me_lifetime_secs: u64,
    /// Invite sign-up token lifetime in seconds (default: 259_200 = 3 days).
    pub sign_up_token_lifetime_secs: u64,
    /// Two-factor authenticate token lifetime (default: 600 = 10 minutes).
    pub authenticate_token_lifetime_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    /// Minimum password length for policy enforcement.
    pub min_password_length: usize,
    /// Sign-in is refused once this many consecutive failures are
    /// recorded (default: 10).
    pub max_failed_login_attempts: u32,
    /// 256-bit AES-GCM key for encrypting phone numbers at rest.
    /// `None` disables phone-based two-factor.
    pub phone_encryption_key: Option<[u8; 32]>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            jwt_issuer: "tracker".into(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 43_200,
            remember_me_lifetime_secs: 604_800,
            sign_up_token_lifetime_secs: 259_200,
            authenticate_token_lifetime_secs: 600,
            pepper: None,
            min_password_length: 12,
            max_failed_login_attempts: 10,
            phone_encryption_key: None,
        }
    }
}
