//! Organization domain model.
//!
//! Organizations carry a bilingual detail block: every human-facing
//! field exists once in English and once in French.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::Language;

/// Per-language descriptive fields of an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDetails {
    /// URL-safe identifier derived from the name (e.g. `treasury-board`).
    pub slug: String,
    pub acronym: String,
    pub name: String,
    pub zone: String,
    pub sector: String,
    pub country: String,
    pub province: String,
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub key: Uuid,
    pub verified: bool,
    pub externally_managed: bool,
    pub external_id: Option<String>,
    pub en: OrgDetails,
    pub fr: OrgDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn details(&self, lang: Language) -> &OrgDetails {
        match lang {
            Language::English => &self.en,
            Language::French => &self.fr,
        }
    }

    pub fn name(&self, lang: Language) -> &str {
        &self.details(lang).name
    }

    pub fn slug(&self, lang: Language) -> &str {
        &self.details(lang).slug
    }
}

/// Fields written when an organization is created.
#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub key: Uuid,
    pub verified: bool,
    pub externally_managed: bool,
    pub external_id: Option<String>,
    pub en: OrgDetails,
    pub fr: OrgDetails,
}

/// Replacement values for an organization update. Callers merge the
/// requested changes over the current record before writing.
#[derive(Debug, Clone)]
pub struct UpdateOrganization {
    pub externally_managed: bool,
    pub external_id: Option<String>,
    pub en: OrgDetails,
    pub fr: OrgDetails,
}

/// Turn an organization name into its URL slug.
///
/// Lower-cases, replaces runs of non-alphanumeric characters with a
/// single `-` and trims dashes from both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}
