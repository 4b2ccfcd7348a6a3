//! Graph edges between organizations, users and domains.

use uuid::Uuid;

use super::domain::AssetState;
use super::permission::Permission;

/// `affiliation` edge: organization → user, labelled with a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affiliation {
    /// Edge record key, assigned by storage.
    pub key: String,
    pub org_key: Uuid,
    pub user_key: Uuid,
    pub permission: Permission,
}

/// `claim` edge: organization → domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub key: String,
    pub org_key: Uuid,
    pub domain_key: Uuid,
    pub tags: Vec<String>,
    pub hidden: bool,
    pub asset_state: AssetState,
    /// ISO-8601 timestamp of when the organization first claimed the domain.
    pub first_seen: String,
}

/// Attributes written on a new claim edge.
#[derive(Debug, Clone, Default)]
pub struct ClaimAttributes {
    pub tags: Vec<String>,
    pub hidden: bool,
    pub asset_state: AssetState,
}

/// `ownership` edge: organization → domain. At most one per domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    pub key: String,
    pub org_key: Uuid,
    pub domain_key: Uuid,
}

/// A domain claimed by an organization together with the total number
/// of organizations claiming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainClaimCount {
    pub domain_key: Uuid,
    pub claim_count: u64,
}
