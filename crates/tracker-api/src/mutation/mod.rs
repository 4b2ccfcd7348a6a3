//! Mutations, grouped by the entity they act on.
//!
//! Each returns [`MutationResult`]: `Ok(Err(..))` is an expected,
//! client-visible rejection (already logged at `warn`), `Err(..)` an
//! infrastructure fault (already logged at `error`).

pub mod affiliation;
pub mod domain;
pub mod organization;
pub mod user;

use tracker_core::models::audit::AuditOrganization;
use tracker_core::models::organization::Organization;
use tracker_core::models::user::Language;
use tracker_core::mutation::{MutationError, MutationResult};

pub use affiliation::{
    InviteUserToOrgInput, RemoveUserFromOrgInput, TransferOrgOwnershipInput,
    UpdateUserRoleInput,
};
pub use domain::{
    AddOrganizationsDomainsInput, CreateDomainInput, RemoveDomainInput,
    RemoveOrganizationsDomainsInput, UpdateDomainInput,
};
pub use organization::{
    CreateOrganizationInput, OrgDetailsInput, OrgDetailsPatch, UpdateOrganizationInput,
};
pub use user::{
    AuthenticateInput, SignInInput, SignUpInput, UpdateUserPasswordInput, UpdateUserProfileInput,
};

pub(crate) fn reject<T>(error: MutationError) -> MutationResult<T> {
    Ok(Err(error))
}

pub(crate) fn audit_org(org: &Organization, language: Language) -> AuditOrganization {
    AuditOrganization {
        id: org.key,
        name: org.name(language).to_owned(),
    }
}
