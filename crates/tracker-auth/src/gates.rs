//! Fail-fast request gates run at the top of every mutation.
//!
//! Gates never produce tagged business errors: a failed gate is an
//! authentication or authorization fault and aborts the request.

use tracing::warn;
use tracker_core::models::user::{TfaSendMethod, User};

use crate::error::AuthError;

/// The caller must be signed in and still exist.
pub fn user_required(user: Option<User>) -> Result<User, AuthError> {
    user.ok_or_else(|| {
        warn!("User attempted to access a protected mutation without authenticating");
        AuthError::NotAuthenticated
    })
}

/// The caller must have validated their email address.
pub fn verified_required(user: &User) -> Result<(), AuthError> {
    if user.email_validated {
        Ok(())
    } else {
        warn!(user_key = %user.key, "User attempted a mutation without a verified email");
        Err(AuthError::NotVerified)
    }
}

/// The caller must have a two-factor send method configured.
pub fn tfa_required(user: &User) -> Result<(), AuthError> {
    if user.tfa_send_method != TfaSendMethod::None {
        Ok(())
    } else {
        warn!(user_key = %user.key, "User attempted a mutation without two-factor enabled");
        Err(AuthError::TfaNotEnabled)
    }
}

pub fn super_admin_required(user: &User, is_super_admin: bool) -> Result<(), AuthError> {
    if is_super_admin {
        Ok(())
    } else {
        warn!(user_key = %user.key, "User attempted a super admin mutation");
        Err(AuthError::NotSuperAdmin)
    }
}
