//! Domain model and its compliance status block.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusValue {
    Pass,
    Fail,
    Info,
    #[default]
    Unknown,
}

/// Latest per-check result. New domains start with every check
/// `unknown` until the scanners report back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainStatus {
    pub certificates: StatusValue,
    pub ciphers: StatusValue,
    pub curves: StatusValue,
    pub dkim: StatusValue,
    pub dmarc: StatusValue,
    pub hsts: StatusValue,
    pub https: StatusValue,
    pub policy: StatusValue,
    pub protocols: StatusValue,
    pub spf: StatusValue,
    pub ssl: StatusValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub key: Uuid,
    /// Fully qualified, lower-case domain name. Unique.
    pub domain: String,
    /// SHA-256 of the domain name, hex-encoded.
    pub hash: String,
    pub status: DomainStatus,
    pub archived: bool,
    /// DKIM selectors to check.
    pub selectors: Vec<String>,
    pub last_ran: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written when a domain vertex is first created.
#[derive(Debug, Clone)]
pub struct NewDomain {
    pub key: Uuid,
    pub domain: String,
    pub hash: String,
    pub selectors: Vec<String>,
    pub archived: bool,
}

/// Lifecycle classification an organization gives its claim on a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetState {
    #[default]
    Approved,
    Dependency,
    MonitorOnly,
    Candidate,
    RequiresInvestigation,
}

impl AssetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetState::Approved => "approved",
            AssetState::Dependency => "dependency",
            AssetState::MonitorOnly => "monitor-only",
            AssetState::Candidate => "candidate",
            AssetState::RequiresInvestigation => "requires-investigation",
        }
    }
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetState {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(AssetState::Approved),
            "dependency" => Ok(AssetState::Dependency),
            "monitor-only" => Ok(AssetState::MonitorOnly),
            "candidate" => Ok(AssetState::Candidate),
            "requires-investigation" => Ok(AssetState::RequiresInvestigation),
            other => Err(TrackerError::Validation {
                message: format!("unknown asset state: {other}"),
            }),
        }
    }
}

/// Normalize a user-supplied domain name: trim, lower-case, drop a
/// trailing root dot.
pub fn clean_domain_name(raw: &str) -> String {
    raw.trim().trim_end_matches('.').to_lowercase()
}

/// Whether a cleaned name is a syntactically valid host name with at
/// least two labels.
pub fn is_valid_domain_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        })
}
