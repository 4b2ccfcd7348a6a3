//! Success payloads. Each serializes with a `_type` discriminator so
//! clients can match it against the `{"_type": "error", ...}` variant.

use serde::Serialize;
use tracker_core::models::domain::Domain;
use tracker_core::models::organization::Organization;
use tracker_core::models::permission::Permission;
use tracker_core::models::user::{Language, TfaSendMethod, User};
use uuid::Uuid;

/// Plain acknowledgement with a human-readable status line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "regular")]
pub struct StatusPayload {
    pub status: String,
}

impl StatusPayload {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "regular", rename_all = "camelCase")]
pub struct AffiliationPayload {
    pub status: String,
    pub user_key: Uuid,
    pub org_key: Uuid,
    pub permission: Permission,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "_type", rename = "organization")]
pub struct OrganizationPayload {
    pub organization: Organization,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "_type", rename = "domain")]
pub struct DomainPayload {
    pub domain: Domain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "result")]
pub struct BulkAddPayload {
    pub status: String,
    pub added: u64,
}

/// One domain a bulk removal skipped, with the reason it was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    pub domain: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "result")]
pub struct BulkRemovePayload {
    pub status: String,
    pub removed: u64,
    pub failures: Vec<BulkFailure>,
}

/// Client-safe projection of a user record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub key: Uuid,
    pub user_name: String,
    pub display_name: String,
    pub preferred_lang: Language,
    pub email_validated: bool,
    pub phone_validated: bool,
    pub tfa_send_method: TfaSendMethod,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            key: user.key,
            user_name: user.user_name.clone(),
            display_name: user.display_name.clone(),
            preferred_lang: user.preferred_lang,
            email_validated: user.email_validated,
            phone_validated: user.phone_validated,
            tfa_send_method: user.tfa_send_method,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "success")]
pub struct UserPayload {
    pub status: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "authResult", rename_all = "camelCase")]
pub struct AuthResult {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

/// Sign-in stopped at the second factor: a code has been sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type", rename = "tfa", rename_all = "camelCase")]
pub struct TfaSignIn {
    pub send_method: TfaSendMethod,
    pub authenticate_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignInPayload {
    Authenticated(AuthResult),
    Tfa(TfaSignIn),
}
