//! Outbound email and SMS notifications.

use async_trait::async_trait;
use tracing::info;
use tracker_core::models::permission::Permission;
use tracker_core::models::user::Language;

use crate::error::SideEffectError;

/// One message to deliver. Copy lives with the delivery service; the
/// pipeline only names the event and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Invite for someone without an account, carrying the sign-up token.
    OrgInviteCreateAccount {
        user_name: String,
        org_name: String,
        sign_up_token: String,
        language: Language,
    },
    /// An existing user was added to an organization.
    OrgInvite {
        user_name: String,
        display_name: String,
        org_name: String,
        language: Language,
    },
    RoleChanged {
        user_name: String,
        org_name: String,
        old_role: Permission,
        new_role: Permission,
        language: Language,
    },
    /// Sent to each admin when a user asks to join.
    AffiliationRequested {
        admin_user_name: String,
        requester_user_name: String,
        org_name: String,
        language: Language,
    },
    Verification {
        user_name: String,
        verify_token: String,
        language: Language,
    },
    TfaCodeEmail {
        user_name: String,
        code: String,
        language: Language,
    },
    TfaCodeText {
        phone_number: String,
        code: String,
    },
    PasswordChanged {
        user_name: String,
        language: Language,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::OrgInviteCreateAccount { .. } => "org_invite_create_account",
            Notification::OrgInvite { .. } => "org_invite",
            Notification::RoleChanged { .. } => "role_changed",
            Notification::AffiliationRequested { .. } => "affiliation_requested",
            Notification::Verification { .. } => "verification",
            Notification::TfaCodeEmail { .. } => "tfa_code_email",
            Notification::TfaCodeText { .. } => "tfa_code_text",
            Notification::PasswordChanged { .. } => "password_changed",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), SideEffectError>;
}

/// Writes each notification to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, notification: Notification) -> Result<(), SideEffectError> {
        info!(kind = notification.kind(), "Notification sent");
        Ok(())
    }
}
