//! SurrealDB repository implementations.

mod affiliation;
mod audit_log;
mod claim;
mod domain;
mod organization;
mod user;

pub use affiliation::SurrealAffiliationRepository;
pub use audit_log::SurrealAuditLogRepository;
pub use claim::SurrealClaimRepository;
pub use domain::SurrealDomainRepository;
pub use organization::SurrealOrganizationRepository;
pub use user::SurrealUserRepository;

use uuid::Uuid;

use crate::error::DbError;

/// Parse a `meta::id(..)` record key back into a UUID.
fn parse_key(raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid UUID {raw}: {e}")))
}
