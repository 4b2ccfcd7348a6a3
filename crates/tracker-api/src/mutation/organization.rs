//! Creating, updating, verifying, archiving and removing organizations.

use surrealdb::Connection;
use tracing::{error, info, warn};
use tracker_core::error::TrackerError;
use tracker_core::global_id::{ORGANIZATION_TYPE, key_of};
use tracker_core::models::audit::{
    AuditAction, AuditStatus, AuditTarget, CreateAuditLogEntry, ResourceType, UpdatedProperty,
};
use tracker_core::models::organization::{
    NewOrganization, OrgDetails, Organization, UpdateOrganization, slugify,
};
use tracker_core::models::permission::Permission;
use tracker_core::mutation::{ErrorMessage, MutationError, MutationResult};
use tracker_core::repository::{ClaimRepository, OrganizationRepository};
use tracker_core::transaction::{Statement, TransactionEngine};
use tracker_db::statement::{domain as domain_stmt, edge, organization as org_stmt};
use uuid::Uuid;

use super::{audit_org, reject};
use crate::context::RequestContext;
use crate::error::OrUnableTo;
use crate::payload::{OrganizationPayload, StatusPayload};
use crate::service::Mutations;

/// One language's descriptive fields. The slug is derived from `name`.
#[derive(Debug, Clone, Default)]
pub struct OrgDetailsInput {
    pub acronym: String,
    pub name: String,
    pub zone: String,
    pub sector: String,
    pub country: String,
    pub province: String,
    pub city: String,
}

impl OrgDetailsInput {
    fn cleanse(self) -> OrgDetails {
        let name = self.name.trim().to_owned();
        OrgDetails {
            slug: slugify(&name),
            acronym: self.acronym.trim().to_uppercase(),
            name,
            zone: self.zone.trim().to_owned(),
            sector: self.sector.trim().to_owned(),
            country: self.country.trim().to_owned(),
            province: self.province.trim().to_owned(),
            city: self.city.trim().to_owned(),
        }
    }
}

/// Changed fields for one language. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct OrgDetailsPatch {
    pub acronym: Option<String>,
    pub name: Option<String>,
    pub zone: Option<String>,
    pub sector: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
}

impl OrgDetailsPatch {
    fn apply(&self, current: &OrgDetails) -> OrgDetails {
        let pick = |new: &Option<String>, old: &str| {
            new.as_deref().map(str::trim).unwrap_or(old).to_owned()
        };
        let name = pick(&self.name, &current.name);
        OrgDetails {
            slug: if self.name.is_some() {
                slugify(&name)
            } else {
                current.slug.clone()
            },
            acronym: self
                .acronym
                .as_deref()
                .map(|a| a.trim().to_uppercase())
                .unwrap_or_else(|| current.acronym.clone()),
            name,
            zone: pick(&self.zone, &current.zone),
            sector: pick(&self.sector, &current.sector),
            country: pick(&self.country, &current.country),
            province: pick(&self.province, &current.province),
            city: pick(&self.city, &current.city),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateOrganizationInput {
    pub en: OrgDetailsInput,
    pub fr: OrgDetailsInput,
    pub externally_managed: bool,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOrganizationInput {
    /// Global ID of the organization.
    pub id: String,
    pub en: OrgDetailsPatch,
    pub fr: OrgDetailsPatch,
    pub externally_managed: Option<bool>,
    /// `Some(None)` clears the external ID.
    pub external_id: Option<Option<String>>,
}

/// A usable name must survive slugging, so `"--"` counts as blank.
fn is_named(details: &OrgDetails) -> bool {
    !details.name.is_empty() && !details.slug.is_empty()
}

fn details_changes(suffix: &str, old: &OrgDetails, new: &OrgDetails) -> Vec<UpdatedProperty> {
    let fields = [
        ("acronym", &old.acronym, &new.acronym),
        ("name", &old.name, &new.name),
        ("zone", &old.zone, &new.zone),
        ("sector", &old.sector, &new.sector),
        ("country", &old.country, &new.country),
        ("province", &old.province, &new.province),
        ("city", &old.city, &new.city),
    ];
    fields
        .into_iter()
        .filter(|(_, old, new)| old != new)
        .map(|(field, old, new)| {
            UpdatedProperty::new(format!("{field}_{suffix}"), old.as_str(), new.as_str())
        })
        .collect()
}

impl<C: Connection, E: TransactionEngine> Mutations<C, E> {
    async fn slug_taken(
        &self,
        ctx: &RequestContext<C>,
        slug: &str,
        exclude: Option<Uuid>,
        action: &str,
    ) -> Result<bool, TrackerError> {
        let found = ctx
            .loaders
            .org_by_slug
            .load(slug.to_owned())
            .await
            .or_unable_to(action)?;
        Ok(found.is_some_and(|org| Some(org.key) != exclude))
    }

    async fn reload_org(
        &self,
        ctx: &RequestContext<C>,
        key: Uuid,
        action: &str,
    ) -> Result<Organization, TrackerError> {
        ctx.loaders
            .org_by_key
            .load(key)
            .await
            .or_unable_to(action)?
            .ok_or_else(|| {
                error!(org_key = %key, "Organization missing after commit");
                TrackerError::unable_to(action)
            })
    }

    /// Create an organization. The creator becomes its owner.
    pub async fn create_organization(
        &self,
        ctx: &RequestContext<C>,
        input: CreateOrganizationInput,
    ) -> MutationResult<OrganizationPayload> {
        const ACTION: &str = "create organization";
        let user = self.verified_user(ctx).await?;

        let en = input.en.cleanse();
        let fr = input.fr.cleanse();
        if !is_named(&en) || !is_named(&fr) {
            warn!(user_key = %user.key, "User attempted to create an organization without a name");
            return reject(MutationError::bad_request(ErrorMessage::OrgNameRequired));
        }

        if input.externally_managed || input.external_id.is_some() {
            let is_super_admin = self
                .resolver
                .check_super_admin(user.key)
                .await
                .or_unable_to(ACTION)?;
            if !is_super_admin {
                warn!(user_key = %user.key, "User attempted to create an externally managed organization");
                return reject(MutationError::forbidden(
                    ErrorMessage::UpdateOrgExternalNeedsSuperAdmin,
                ));
            }
        }

        let slug_taken = self.slug_taken(ctx, &en.slug, None, ACTION).await?
            || self.slug_taken(ctx, &fr.slug, None, ACTION).await?;
        let name_taken = self
            .orgs
            .name_in_use(&en.name, &fr.name, None)
            .await
            .or_unable_to(ACTION)?;
        if slug_taken || name_taken {
            warn!(user_key = %user.key, name_en = %en.name, name_fr = %fr.name, "User attempted to create an organization with a name in use");
            return reject(MutationError::bad_request(ErrorMessage::OrgNameInUse));
        }

        let key = Uuid::new_v4();
        let new = NewOrganization {
            key,
            verified: false,
            externally_managed: input.externally_managed,
            external_id: input.external_id.map(|id| id.trim().to_owned()),
            en,
            fr,
        };
        self.write(
            vec![
                org_stmt::insert(&new),
                edge::relate_affiliation(key, user.key, Permission::Owner),
            ],
            ACTION,
        )
        .await?;

        ctx.loaders.org_by_slug.clear(&new.en.slug).await;
        ctx.loaders.org_by_slug.clear(&new.fr.slug).await;
        let org = self.reload_org(ctx, key, ACTION).await?;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, None),
                action: AuditAction::Create,
                target: AuditTarget {
                    resource: org.name(ctx.language).to_owned(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::Org,
                    updated_properties: Vec::new(),
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, org_key = %org.key, "User created organization");
        Ok(Ok(OrganizationPayload { organization: org }))
    }

    pub async fn update_organization(
        &self,
        ctx: &RequestContext<C>,
        input: UpdateOrganizationInput,
    ) -> MutationResult<OrganizationPayload> {
        const ACTION: &str = "update organization";
        let user = self.verified_user(ctx).await?;

        let org = match key_of(&input.id, ORGANIZATION_TYPE) {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(org) = org else {
            warn!(user_key = %user.key, org_id = %input.id, "User attempted to update an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::UpdateOrgUnknown));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_admin) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to update an organization without admin permission");
            return reject(MutationError::forbidden(ErrorMessage::UpdateOrgNeedsAdmin));
        };

        let externally_managed = input.externally_managed.unwrap_or(org.externally_managed);
        let external_id = match &input.external_id {
            Some(id) => id.as_deref().map(|id| id.trim().to_owned()),
            None => org.external_id.clone(),
        };
        let external_changed =
            externally_managed != org.externally_managed || external_id != org.external_id;
        if external_changed && permission != Permission::SuperAdmin {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to change external organization settings");
            return reject(MutationError::forbidden(
                ErrorMessage::UpdateOrgExternalNeedsSuperAdmin,
            ));
        }

        let en = input.en.apply(&org.en);
        let fr = input.fr.apply(&org.fr);
        if !is_named(&en) || !is_named(&fr) {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to blank an organization's name");
            return reject(MutationError::bad_request(ErrorMessage::OrgNameRequired));
        }

        if en.name != org.en.name || fr.name != org.fr.name {
            let slug_taken = (en.slug != org.en.slug
                && self.slug_taken(ctx, &en.slug, Some(org.key), ACTION).await?)
                || (fr.slug != org.fr.slug
                    && self.slug_taken(ctx, &fr.slug, Some(org.key), ACTION).await?);
            let name_taken = self
                .orgs
                .name_in_use(&en.name, &fr.name, Some(org.key))
                .await
                .or_unable_to(ACTION)?;
            if slug_taken || name_taken {
                warn!(user_key = %user.key, org_key = %org.key, "User attempted to rename an organization to a name in use");
                return reject(MutationError::bad_request(ErrorMessage::OrgNameInUse));
            }
        }

        let mut changes = details_changes("en", &org.en, &en);
        changes.extend(details_changes("fr", &org.fr, &fr));
        if externally_managed != org.externally_managed {
            changes.push(UpdatedProperty::new(
                "externally_managed",
                org.externally_managed,
                externally_managed,
            ));
        }
        if external_id != org.external_id {
            changes.push(UpdatedProperty::new(
                "external_id",
                org.external_id.clone(),
                external_id.clone(),
            ));
        }
        if changes.is_empty() {
            return Ok(Ok(OrganizationPayload { organization: org }));
        }

        let update = UpdateOrganization {
            externally_managed,
            external_id,
            en,
            fr,
        };
        self.write(vec![org_stmt::update(org.key, &update)], ACTION)
            .await?;

        ctx.loaders.clear_org(&org).await;
        ctx.loaders.org_by_slug.clear(&update.en.slug).await;
        ctx.loaders.org_by_slug.clear(&update.fr.slug).await;
        let updated = self.reload_org(ctx, org.key, ACTION).await?;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                action: AuditAction::Update,
                target: AuditTarget {
                    resource: updated.name(ctx.language).to_owned(),
                    organization: Some(audit_org(&updated, ctx.language)),
                    resource_type: ResourceType::Org,
                    updated_properties: changes,
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, org_key = %org.key, "User updated organization");
        Ok(Ok(OrganizationPayload {
            organization: updated,
        }))
    }

    pub async fn verify_organization(
        &self,
        ctx: &RequestContext<C>,
        org_id: &str,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "verify organization";
        let user = self.verified_user(ctx).await?;

        let org = match key_of(org_id, ORGANIZATION_TYPE) {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(org) = org else {
            warn!(user_key = %user.key, org_id, "User attempted to verify an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::VerifyOrgUnknown));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        if permission != Some(Permission::SuperAdmin) {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to verify an organization without super admin permission");
            return reject(MutationError::forbidden(ErrorMessage::VerifyOrgNeedsSuperAdmin));
        }
        if org.verified {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to verify an organization that is already verified");
            return reject(MutationError::bad_request(ErrorMessage::VerifyOrgAlreadyVerified));
        }

        self.write(vec![org_stmt::set_verified(org.key, true)], ACTION)
            .await?;
        ctx.loaders.clear_org(&org).await;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, permission),
                action: AuditAction::Update,
                target: AuditTarget {
                    resource: org.name(ctx.language).to_owned(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::Org,
                    updated_properties: vec![UpdatedProperty::new("verified", false, true)],
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, org_key = %org.key, "User verified organization");
        Ok(Ok(StatusPayload::new(format!(
            "Successfully verified organization: {}.",
            org.slug(ctx.language)
        ))))
    }

    /// Soft removal: unset `verified` and archive the domains that only
    /// this organization claims. Shared domains are left alone.
    pub async fn archive_organization(
        &self,
        ctx: &RequestContext<C>,
        org_id: &str,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "archive organization";
        let user = self.verified_user(ctx).await?;

        let org = match key_of(org_id, ORGANIZATION_TYPE) {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(org) = org else {
            warn!(user_key = %user.key, org_id, "User attempted to archive an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::ArchiveOrgUnknown));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_owner) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to archive an organization without owner permission");
            return reject(MutationError::forbidden(ErrorMessage::ArchiveOrgNeedsOwner));
        };
        if org.verified && permission != Permission::SuperAdmin {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to archive a verified organization");
            return reject(MutationError::forbidden(
                ErrorMessage::ArchiveVerifiedOrgNeedsSuperAdmin,
            ));
        }

        let counts = self
            .orgs
            .domain_claim_counts(org.key)
            .await
            .or_unable_to(ACTION)?;
        let sole: Vec<Uuid> = counts
            .iter()
            .filter(|c| c.claim_count == 1)
            .map(|c| c.domain_key)
            .collect();

        let mut steps: Vec<Statement> = sole
            .iter()
            .map(|key| domain_stmt::set_archived(*key, true))
            .collect();
        steps.push(org_stmt::set_verified(org.key, false));
        self.write(steps, ACTION).await?;

        ctx.loaders.clear_org(&org).await;
        for key in &sole {
            ctx.loaders.domain_by_key.clear(key).await;
        }
        ctx.loaders.domain_by_name.clear_all().await;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                action: AuditAction::Update,
                target: AuditTarget {
                    resource: org.name(ctx.language).to_owned(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::Org,
                    updated_properties: vec![UpdatedProperty::new(
                        "verified",
                        org.verified,
                        false,
                    )],
                },
                status: AuditStatus::Success,
                reason: Some(format!("archived {} domains", sole.len())),
            })
            .await;

        info!(
            user_key = %user.key,
            org_key = %org.key,
            archived_domains = sole.len(),
            "User archived organization"
        );
        Ok(Ok(StatusPayload::new(format!(
            "Successfully archived organization: {}.",
            org.slug(ctx.language)
        ))))
    }

    /// Hard removal, in dependency order: every owned domain's DMARC
    /// summaries and ownership edge, then each claimed domain (full cascade when this was its only
    /// claim, claim edge only otherwise), then affiliations, summaries
    /// and the organization vertex.
    pub async fn remove_organization(
        &self,
        ctx: &RequestContext<C>,
        org_id: &str,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "remove organization";
        let user = self.verified_user(ctx).await?;

        let org = match key_of(org_id, ORGANIZATION_TYPE) {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(org) = org else {
            warn!(user_key = %user.key, org_id, "User attempted to remove an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::RemoveOrgUnknown));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_owner) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to remove an organization without owner permission");
            return reject(MutationError::forbidden(ErrorMessage::RemoveOrgNeedsOwner));
        };
        if org.verified && permission != Permission::SuperAdmin {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to remove a verified organization");
            return reject(MutationError::forbidden(
                ErrorMessage::RemoveVerifiedOrgNeedsSuperAdmin,
            ));
        }

        let counts = self
            .orgs
            .domain_claim_counts(org.key)
            .await
            .or_unable_to(ACTION)?;

        let ownerships = self
            .claims
            .list_ownerships(org.key)
            .await
            .or_unable_to(ACTION)?;

        let mut steps = Vec::new();
        for ownership in &ownerships {
            steps.extend(domain_stmt::ownership_cleanup(org.key, ownership.domain_key));
        }
        for count in &counts {
            if count.claim_count <= 1 {
                steps.extend(domain_stmt::cascade_delete(count.domain_key));
            } else {
                steps.push(edge::delete_claim(org.key, count.domain_key));
            }
        }
        steps.push(org_stmt::delete_ownerships(org.key));
        steps.push(org_stmt::delete_affiliations(org.key));
        steps.push(org_stmt::delete_summaries(org.key));
        steps.push(org_stmt::delete(org.key));
        self.write(steps, ACTION).await?;

        ctx.loaders.clear_org(&org).await;
        ctx.loaders.domain_by_key.clear_all().await;
        ctx.loaders.domain_by_name.clear_all().await;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                action: AuditAction::Delete,
                target: AuditTarget {
                    resource: org.name(ctx.language).to_owned(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::Org,
                    updated_properties: Vec::new(),
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, org_key = %org.key, "User removed organization");
        Ok(Ok(StatusPayload::new(format!(
            "Successfully removed organization: {}.",
            org.slug(ctx.language)
        ))))
    }
}
