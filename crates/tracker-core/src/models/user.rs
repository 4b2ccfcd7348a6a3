//! User domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    French,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::French => "french",
        }
    }
}

impl FromStr for Language {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "english" | "en" => Ok(Language::English),
            "french" | "fr" => Ok(Language::French),
            other => Err(TrackerError::Validation {
                message: format!("unknown language: {other}"),
            }),
        }
    }
}

/// Channel over which two-factor codes are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TfaSendMethod {
    #[default]
    None,
    Email,
    Phone,
}

impl TfaSendMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TfaSendMethod::None => "none",
            TfaSendMethod::Email => "email",
            TfaSendMethod::Phone => "phone",
        }
    }
}

impl fmt::Display for TfaSendMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TfaSendMethod {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(TfaSendMethod::None),
            "email" => Ok(TfaSendMethod::Email),
            "phone" => Ok(TfaSendMethod::Phone),
            other => Err(TrackerError::Validation {
                message: format!("unknown tfa send method: {other}"),
            }),
        }
    }
}

/// Refresh-session bookkeeping stored on the user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshInfo {
    pub refresh_id: String,
    pub expires_at: DateTime<Utc>,
    pub remember_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub key: Uuid,
    /// Email address used as the login name. Stored lower-case.
    pub user_name: String,
    pub display_name: String,
    pub password_hash: String,
    pub preferred_lang: Language,
    pub email_validated: bool,
    pub phone_validated: bool,
    pub tfa_send_method: TfaSendMethod,
    pub failed_login_attempts: u32,
    pub refresh_info: Option<RefreshInfo>,
    /// Outstanding one-time two-factor code, if any.
    pub tfa_code: Option<String>,
    /// AES-256-GCM encrypted phone number.
    pub phone_details: Option<String>,
    pub insider_user: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written when a user signs up.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub key: Uuid,
    pub user_name: String,
    pub display_name: String,
    pub password_hash: String,
    pub preferred_lang: Language,
}

/// Partial update of a user record. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub preferred_lang: Option<Language>,
    pub email_validated: Option<bool>,
    pub phone_validated: Option<bool>,
    pub tfa_send_method: Option<TfaSendMethod>,
    pub failed_login_attempts: Option<u32>,
    /// `Some(Some(info))` = set, `Some(None)` = clear, `None` = no change.
    pub refresh_info: Option<Option<RefreshInfo>>,
    pub tfa_code: Option<Option<String>>,
    pub phone_details: Option<Option<String>>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.password_hash.is_none()
            && self.preferred_lang.is_none()
            && self.email_validated.is_none()
            && self.phone_validated.is_none()
            && self.tfa_send_method.is_none()
            && self.failed_login_attempts.is_none()
            && self.refresh_info.is_none()
            && self.tfa_code.is_none()
            && self.phone_details.is_none()
    }
}
