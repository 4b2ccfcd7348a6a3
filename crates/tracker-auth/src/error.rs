//! Authentication error types.

use thiserror::Error;
use tracker_core::error::TrackerError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication is required")]
    NotAuthenticated,

    #[error("email address is not verified")]
    NotVerified,

    #[error("two-factor authentication is not enabled")]
    TfaNotEnabled,

    #[error("super admin permission is required")]
    NotSuperAdmin,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("phone encryption is not configured")]
    PhoneEncryptionDisabled,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for TrackerError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotAuthenticated | AuthError::TokenExpired | AuthError::TokenInvalid(_) => {
                TrackerError::AuthenticationFailed {
                    reason: err.to_string(),
                }
            }
            AuthError::NotVerified | AuthError::TfaNotEnabled | AuthError::NotSuperAdmin => {
                TrackerError::AuthorizationDenied {
                    reason: err.to_string(),
                }
            }
            AuthError::PhoneEncryptionDisabled => TrackerError::Internal(err.to_string()),
            AuthError::Crypto(msg) => TrackerError::Crypto(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_failures_are_classified() {
        assert!(matches!(
            TrackerError::from(AuthError::NotAuthenticated),
            TrackerError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            TrackerError::from(AuthError::NotVerified),
            TrackerError::AuthorizationDenied { .. }
        ));
        assert!(matches!(
            TrackerError::from(AuthError::Crypto("x".into())),
            TrackerError::Crypto(_)
        ));
    }
}
