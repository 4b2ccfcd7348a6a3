//! Repository trait definitions for data access abstraction.
//!
//! Repositories are read-side: every lookup returns `Ok(None)` (or an
//! empty collection) for missing entities and reserves `Err` for
//! infrastructure faults. Writes go through
//! [`crate::transaction::TransactionEngine`] so that multi-document
//! changes stay atomic.

use uuid::Uuid;

use crate::error::TrackerResult;
use crate::models::{
    affiliation::{Affiliation, Claim, DomainClaimCount, Ownership},
    audit::{AuditAction, AuditLogEntry, ResourceType},
    domain::Domain,
    organization::Organization,
    permission::Permission,
    user::User,
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Vertices
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn get_by_key(&self, key: Uuid) -> impl Future<Output = TrackerResult<Option<User>>> + Send;
    /// Case-insensitive lookup by login name.
    fn get_by_user_name(
        &self,
        user_name: &str,
    ) -> impl Future<Output = TrackerResult<Option<User>>> + Send;
    fn get_many(&self, keys: &[Uuid]) -> impl Future<Output = TrackerResult<Vec<User>>> + Send;
    fn get_many_by_user_name(
        &self,
        user_names: &[String],
    ) -> impl Future<Output = TrackerResult<Vec<User>>> + Send;
}

pub trait OrganizationRepository: Send + Sync {
    fn get_by_key(
        &self,
        key: Uuid,
    ) -> impl Future<Output = TrackerResult<Option<Organization>>> + Send;
    /// Matches either the English or the French slug.
    fn get_by_slug(
        &self,
        slug: &str,
    ) -> impl Future<Output = TrackerResult<Option<Organization>>> + Send;
    fn get_many(
        &self,
        keys: &[Uuid],
    ) -> impl Future<Output = TrackerResult<Vec<Organization>>> + Send;
    fn get_many_by_slug(
        &self,
        slugs: &[String],
    ) -> impl Future<Output = TrackerResult<Vec<Organization>>> + Send;
    /// Whether another organization already uses either name.
    fn name_in_use(
        &self,
        name_en: &str,
        name_fr: &str,
        exclude: Option<Uuid>,
    ) -> impl Future<Output = TrackerResult<bool>> + Send;
    /// Every domain claimed by `org_key`, with the number of
    /// organizations claiming it.
    fn domain_claim_counts(
        &self,
        org_key: Uuid,
    ) -> impl Future<Output = TrackerResult<Vec<DomainClaimCount>>> + Send;
}

pub trait DomainRepository: Send + Sync {
    fn get_by_key(&self, key: Uuid) -> impl Future<Output = TrackerResult<Option<Domain>>> + Send;
    fn get_by_name(
        &self,
        domain: &str,
    ) -> impl Future<Output = TrackerResult<Option<Domain>>> + Send;
    fn get_many(&self, keys: &[Uuid]) -> impl Future<Output = TrackerResult<Vec<Domain>>> + Send;
    fn get_many_by_name(
        &self,
        domains: &[String],
    ) -> impl Future<Output = TrackerResult<Vec<Domain>>> + Send;
    fn is_favourite(
        &self,
        user_key: Uuid,
        domain_key: Uuid,
    ) -> impl Future<Output = TrackerResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

pub trait AffiliationRepository: Send + Sync {
    /// The affiliation edge between `org_key` and `user_key`, pending or not.
    fn find(
        &self,
        org_key: Uuid,
        user_key: Uuid,
    ) -> impl Future<Output = TrackerResult<Option<Affiliation>>> + Send;
    /// True if the user holds `super_admin` in any organization.
    fn is_super_admin(&self, user_key: Uuid) -> impl Future<Output = TrackerResult<bool>> + Send;
    fn list_for_org(
        &self,
        org_key: Uuid,
    ) -> impl Future<Output = TrackerResult<Vec<Affiliation>>> + Send;
    fn list_for_user(
        &self,
        user_key: Uuid,
    ) -> impl Future<Output = TrackerResult<Vec<Affiliation>>> + Send;
    fn count_with_permission(
        &self,
        org_key: Uuid,
        permission: Permission,
    ) -> impl Future<Output = TrackerResult<u64>> + Send;
}

pub trait ClaimRepository: Send + Sync {
    fn find(
        &self,
        org_key: Uuid,
        domain_key: Uuid,
    ) -> impl Future<Output = TrackerResult<Option<Claim>>> + Send;
    fn count_for_domain(&self, domain_key: Uuid)
    -> impl Future<Output = TrackerResult<u64>> + Send;
    fn list_for_domain(
        &self,
        domain_key: Uuid,
    ) -> impl Future<Output = TrackerResult<Vec<Claim>>> + Send;
    fn find_ownership(
        &self,
        domain_key: Uuid,
    ) -> impl Future<Output = TrackerResult<Option<Ownership>>> + Send;
    /// Every domain the organization owns, claimed or not.
    fn list_ownerships(
        &self,
        org_key: Uuid,
    ) -> impl Future<Output = TrackerResult<Vec<Ownership>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub initiated_by: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub resource_type: Option<ResourceType>,
    pub organization: Option<Uuid>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Newest first. No update or delete operations exist.
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = TrackerResult<PaginatedResult<AuditLogEntry>>> + Send;
}
