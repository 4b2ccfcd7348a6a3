//! Effective-role resolution over the affiliation edge graph.

use tracing::debug;
use tracker_core::error::TrackerResult;
use tracker_core::models::permission::Permission;
use tracker_core::repository::AffiliationRepository;
use uuid::Uuid;

/// Resolves a caller's role in an organization.
///
/// A `super_admin` affiliation in any organization outranks every
/// organization-scoped edge.
#[derive(Clone)]
pub struct PermissionResolver<R> {
    affiliations: R,
}

impl<R: AffiliationRepository> PermissionResolver<R> {
    pub fn new(affiliations: R) -> Self {
        Self { affiliations }
    }

    pub fn affiliations(&self) -> &R {
        &self.affiliations
    }

    /// The caller's effective permission in `org_key`, or `None` when
    /// no edge exists. A pending request resolves to `Pending`.
    pub async fn check_permission(
        &self,
        user_key: Uuid,
        org_key: Uuid,
    ) -> TrackerResult<Option<Permission>> {
        if self.affiliations.is_super_admin(user_key).await? {
            return Ok(Some(Permission::SuperAdmin));
        }
        let permission = self
            .affiliations
            .find(org_key, user_key)
            .await?
            .map(|edge| edge.permission);
        debug!(%user_key, %org_key, ?permission, "Resolved permission");
        Ok(permission)
    }

    pub async fn check_super_admin(&self, user_key: Uuid) -> TrackerResult<bool> {
        self.affiliations.is_super_admin(user_key).await
    }

    /// True when the caller is an admin (or higher) of any organization
    /// the target user is a member of.
    pub async fn check_user_is_admin_for_user(
        &self,
        user_key: Uuid,
        target_key: Uuid,
    ) -> TrackerResult<bool> {
        if self.affiliations.is_super_admin(user_key).await? {
            return Ok(true);
        }
        let target_orgs = self.affiliations.list_for_user(target_key).await?;
        let caller_orgs = self.affiliations.list_for_user(user_key).await?;
        Ok(caller_orgs.iter().any(|caller| {
            caller.permission.is_admin()
                && target_orgs
                    .iter()
                    .any(|t| t.org_key == caller.org_key && t.permission.is_member())
        }))
    }
}
