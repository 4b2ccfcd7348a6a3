//! Claiming, updating, removing, scanning and favouriting domains.

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use surrealdb::Connection;
use tracing::{error, info, warn};
use tracker_core::error::TrackerError;
use tracker_core::global_id::{DOMAIN_TYPE, ORGANIZATION_TYPE, key_of};
use tracker_core::models::affiliation::ClaimAttributes;
use tracker_core::models::audit::{
    AuditAction, AuditStatus, AuditTarget, CreateAuditLogEntry, ResourceType, UpdatedProperty,
};
use tracker_core::models::domain::{
    AssetState, Domain, NewDomain, clean_domain_name, is_valid_domain_name,
};
use tracker_core::models::organization::Organization;
use tracker_core::models::permission::Permission;
use tracker_core::models::user::User;
use tracker_core::mutation::{ErrorMessage, MutationError, MutationResult};
use tracker_core::repository::{ClaimRepository, DomainRepository};
use tracker_core::transaction::{Statement, TransactionEngine};
use tracker_db::statement::domain::{self as domain_stmt, DomainChanges};
use tracker_db::statement::edge::{self, ClaimChanges};
use uuid::Uuid;

use super::{audit_org, reject};
use crate::context::RequestContext;
use crate::error::OrUnableTo;
use crate::payload::{BulkAddPayload, BulkFailure, BulkRemovePayload, DomainPayload, StatusPayload};
use crate::publish::{ADD_DOMAIN_TO_EASM, SCAN_REQUESTS};
use crate::service::Mutations;

/// SHA-256 of the domain name, hex-encoded.
pub fn domain_hash(domain: &str) -> String {
    hex::encode(Sha256::digest(domain.as_bytes()))
}

fn clean_selectors(selectors: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = selectors
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();
    cleaned.dedup();
    cleaned
}

#[derive(Debug, Clone, Default)]
pub struct CreateDomainInput {
    pub org_id: String,
    pub domain: String,
    pub selectors: Vec<String>,
    pub tags: Vec<String>,
    pub hidden: bool,
    pub asset_state: AssetState,
    pub archived: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateDomainInput {
    pub domain_id: String,
    pub org_id: String,
    pub domain: Option<String>,
    pub selectors: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub hidden: Option<bool>,
    pub asset_state: Option<AssetState>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct RemoveDomainInput {
    pub domain_id: String,
    pub org_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct AddOrganizationsDomainsInput {
    pub org_id: String,
    pub domains: Vec<String>,
    pub hide_new_domains: bool,
    pub tags_new_domains: Vec<String>,
    pub asset_state: AssetState,
    /// Write one audit record per added domain.
    pub audit: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RemoveOrganizationsDomainsInput {
    pub org_id: String,
    pub domains: Vec<String>,
    /// Archive sole-claim domains instead of deleting them.
    pub archive_domains: bool,
    pub audit: bool,
}

/// A validated request to claim one domain for one organization.
struct ClaimRequest {
    name: String,
    selectors: Vec<String>,
    attributes: ClaimAttributes,
    archived: bool,
}

enum ClaimOutcome {
    Added(Domain),
    AlreadyClaimed,
}

impl<C: Connection, E: TransactionEngine> Mutations<C, E> {
    async fn load_org(
        &self,
        ctx: &RequestContext<C>,
        org_id: &str,
        action: &str,
    ) -> Result<Option<Organization>, TrackerError> {
        match key_of(org_id, ORGANIZATION_TYPE) {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(action),
            None => Ok(None),
        }
    }

    async fn load_domain(
        &self,
        ctx: &RequestContext<C>,
        domain_id: &str,
        action: &str,
    ) -> Result<Option<Domain>, TrackerError> {
        match key_of(domain_id, DOMAIN_TYPE) {
            Some(key) => ctx.loaders.domain_by_key.load(key).await.or_unable_to(action),
            None => Ok(None),
        }
    }

    /// UPSERT the domain by name and add the organization's claim edge.
    /// An existing domain vertex is reused, never duplicated.
    async fn claim_domain(
        &self,
        ctx: &RequestContext<C>,
        user: &User,
        org: &Organization,
        claim: ClaimRequest,
        action: &str,
    ) -> Result<ClaimOutcome, TrackerError> {
        let existing = ctx
            .loaders
            .domain_by_name
            .load(claim.name.clone())
            .await
            .or_unable_to(action)?;

        if let Some(domain) = &existing {
            let claimed = self
                .claims
                .find(org.key, domain.key)
                .await
                .or_unable_to(action)?;
            if claimed.is_some() {
                return Ok(ClaimOutcome::AlreadyClaimed);
            }
        }

        let key = existing.as_ref().map_or_else(Uuid::new_v4, |d| d.key);
        let first_seen = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let new = NewDomain {
            key,
            domain: claim.name.clone(),
            hash: domain_hash(&claim.name),
            selectors: claim.selectors,
            archived: claim.archived,
        };
        self.write(
            vec![
                domain_stmt::upsert(&new),
                edge::relate_claim(org.key, key, &claim.attributes, &first_seen),
            ],
            action,
        )
        .await?;

        ctx.loaders.domain_by_name.clear(&claim.name).await;
        ctx.loaders.domain_by_key.clear(&key).await;
        let domain = ctx
            .loaders
            .domain_by_key
            .load(key)
            .await
            .or_unable_to(action)?
            .ok_or_else(|| {
                error!(domain_key = %key, "Domain missing after commit");
                TrackerError::unable_to(action)
            })?;

        self.publish(
            SCAN_REQUESTS,
            json!({
                "domain": domain.domain,
                "domain_key": domain.key,
                "hash": domain.hash,
                "selectors": domain.selectors,
                "user_key": user.key,
                "shared_id": null,
            }),
        )
        .await;
        self.publish(
            ADD_DOMAIN_TO_EASM,
            json!({
                "domain": domain.domain,
                "domain_key": domain.key,
            }),
        )
        .await;

        Ok(ClaimOutcome::Added(domain))
    }

    /// Steps that take the domain away from the organization: ownership
    /// and DMARC summaries first when the organization owns it, then the
    /// full cascade when this is the last claim or just the claim edge
    /// otherwise. With `archive` a last claim archives the domain instead.
    async fn unclaim_steps(
        &self,
        org_key: Uuid,
        domain_key: Uuid,
        archive: bool,
        action: &str,
    ) -> Result<Vec<Statement>, TrackerError> {
        let mut steps = Vec::new();
        let ownership = self
            .claims
            .find_ownership(domain_key)
            .await
            .or_unable_to(action)?;
        if ownership.is_some_and(|o| o.org_key == org_key) {
            steps.extend(domain_stmt::ownership_cleanup(org_key, domain_key));
        }

        let claims = self
            .claims
            .count_for_domain(domain_key)
            .await
            .or_unable_to(action)?;
        if claims <= 1 {
            if archive {
                steps.push(domain_stmt::set_archived(domain_key, true));
            } else {
                steps.extend(domain_stmt::cascade_delete(domain_key));
            }
        } else {
            steps.push(edge::delete_claim(org_key, domain_key));
        }
        Ok(steps)
    }

    /// Claim a domain for an organization, creating it if needed, and
    /// ask the scanners to look at it.
    pub async fn create_domain(
        &self,
        ctx: &RequestContext<C>,
        input: CreateDomainInput,
    ) -> MutationResult<DomainPayload> {
        const ACTION: &str = "create domain";
        let user = self.verified_user(ctx).await?;

        let name = clean_domain_name(&input.domain);
        if !is_valid_domain_name(&name) {
            warn!(user_key = %user.key, domain = %input.domain, "User attempted to create an invalid domain");
            return reject(MutationError::bad_request(ErrorMessage::InvalidDomainName));
        }

        let Some(org) = self.load_org(ctx, &input.org_id, ACTION).await? else {
            warn!(user_key = %user.key, org_id = %input.org_id, "User attempted to create a domain in an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::CreateDomainUnknownOrg));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_member) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to create a domain without permission");
            return reject(MutationError::forbidden(ErrorMessage::CreateDomainNeedsPermission));
        };
        if input.archived && permission != Permission::SuperAdmin {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to create an archived domain");
            return reject(MutationError::forbidden(ErrorMessage::ArchiveDomainNeedsSuperAdmin));
        }

        let claim = ClaimRequest {
            name: name.clone(),
            selectors: clean_selectors(input.selectors),
            attributes: ClaimAttributes {
                tags: clean_tags(input.tags),
                hidden: input.hidden,
                asset_state: input.asset_state,
            },
            archived: input.archived,
        };
        let domain = match self.claim_domain(ctx, &user, &org, claim, ACTION).await? {
            ClaimOutcome::Added(domain) => domain,
            ClaimOutcome::AlreadyClaimed => {
                warn!(user_key = %user.key, org_key = %org.key, domain = %name, "User attempted to create a domain the organization already claims");
                return reject(MutationError::bad_request(
                    ErrorMessage::CreateDomainAlreadyClaimed,
                ));
            }
        };

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                action: AuditAction::Add,
                target: AuditTarget {
                    resource: domain.domain.clone(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::Domain,
                    updated_properties: Vec::new(),
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, org_key = %org.key, domain_key = %domain.key, "User created domain");
        Ok(Ok(DomainPayload { domain }))
    }

    pub async fn update_domain(
        &self,
        ctx: &RequestContext<C>,
        input: UpdateDomainInput,
    ) -> MutationResult<DomainPayload> {
        const ACTION: &str = "update domain";
        let user = self.verified_user(ctx).await?;

        let Some(domain) = self.load_domain(ctx, &input.domain_id, ACTION).await? else {
            warn!(user_key = %user.key, domain_id = %input.domain_id, "User attempted to update an unknown domain");
            return reject(MutationError::bad_request(ErrorMessage::UpdateDomainUnknownDomain));
        };
        let Some(org) = self.load_org(ctx, &input.org_id, ACTION).await? else {
            warn!(user_key = %user.key, org_id = %input.org_id, "User attempted to update a domain in an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::UpdateDomainUnknownOrg));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_admin) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to update a domain without permission");
            return reject(MutationError::forbidden(ErrorMessage::UpdateDomainNeedsPermission));
        };

        let claim = self
            .claims
            .find(org.key, domain.key)
            .await
            .or_unable_to(ACTION)?;
        let Some(claim) = claim else {
            warn!(user_key = %user.key, org_key = %org.key, domain_key = %domain.key, "User attempted to update a domain the organization does not claim");
            return reject(MutationError::bad_request(ErrorMessage::UpdateDomainNotClaimed));
        };

        if input.archived.is_some_and(|a| a != domain.archived) && permission != Permission::SuperAdmin {
            warn!(user_key = %user.key, domain_key = %domain.key, "User attempted to change a domain's archived state");
            return reject(MutationError::forbidden(ErrorMessage::ArchiveDomainNeedsSuperAdmin));
        }

        let mut changes = DomainChanges::default();
        let mut props = Vec::new();

        if let Some(raw) = &input.domain {
            let name = clean_domain_name(raw);
            if !is_valid_domain_name(&name) {
                warn!(user_key = %user.key, domain = %raw, "User attempted to rename a domain to an invalid name");
                return reject(MutationError::bad_request(ErrorMessage::InvalidDomainName));
            }
            if name != domain.domain {
                let taken = ctx
                    .loaders
                    .domain_by_name
                    .load(name.clone())
                    .await
                    .or_unable_to(ACTION)?;
                if taken.is_some() {
                    warn!(user_key = %user.key, domain = %name, "User attempted to rename a domain to a name in use");
                    return reject(MutationError::bad_request(ErrorMessage::DomainNameInUse));
                }
                props.push(UpdatedProperty::new("domain", domain.domain.as_str(), name.as_str()));
                let hash = domain_hash(&name);
                changes.domain = Some((name, hash));
            }
        }
        if let Some(selectors) = input.selectors {
            let selectors = clean_selectors(selectors);
            if selectors != domain.selectors {
                props.push(UpdatedProperty::new(
                    "selectors",
                    domain.selectors.clone(),
                    selectors.clone(),
                ));
                changes.selectors = Some(selectors);
            }
        }
        if let Some(archived) = input.archived.filter(|a| *a != domain.archived) {
            props.push(UpdatedProperty::new("archived", domain.archived, archived));
            changes.archived = Some(archived);
        }

        let mut claim_changes = ClaimChanges::default();
        if let Some(tags) = input.tags.map(clean_tags).filter(|t| *t != claim.tags) {
            props.push(UpdatedProperty::new("tags", claim.tags.clone(), tags.clone()));
            claim_changes.tags = Some(tags);
        }
        if let Some(hidden) = input.hidden.filter(|h| *h != claim.hidden) {
            props.push(UpdatedProperty::new("hidden", claim.hidden, hidden));
            claim_changes.hidden = Some(hidden);
        }
        if let Some(state) = input.asset_state.filter(|s| *s != claim.asset_state) {
            props.push(UpdatedProperty::new(
                "asset_state",
                claim.asset_state.as_str(),
                state.as_str(),
            ));
            claim_changes.asset_state = Some(state);
        }

        let steps: Vec<Statement> = domain_stmt::update(domain.key, &changes)
            .into_iter()
            .chain(edge::update_claim(org.key, domain.key, &claim_changes))
            .collect();
        if steps.is_empty() {
            info!(user_key = %user.key, domain_key = %domain.key, "Domain update changed nothing");
            return Ok(Ok(DomainPayload { domain }));
        }
        self.write(steps, ACTION).await?;

        ctx.loaders.clear_domain(&domain).await;
        if let Some((name, _)) = &changes.domain {
            ctx.loaders.domain_by_name.clear(name).await;
        }
        let updated = ctx
            .loaders
            .domain_by_key
            .load(domain.key)
            .await
            .or_unable_to(ACTION)?
            .ok_or_else(|| {
                error!(domain_key = %domain.key, "Domain missing after commit");
                TrackerError::unable_to(ACTION)
            })?;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                action: AuditAction::Update,
                target: AuditTarget {
                    resource: updated.domain.clone(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::Domain,
                    updated_properties: props,
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, org_key = %org.key, domain_key = %domain.key, "User updated domain");
        Ok(Ok(DomainPayload { domain: updated }))
    }

    pub async fn remove_domain(
        &self,
        ctx: &RequestContext<C>,
        input: RemoveDomainInput,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "remove domain";
        let user = self.verified_user(ctx).await?;

        let Some(domain) = self.load_domain(ctx, &input.domain_id, ACTION).await? else {
            warn!(user_key = %user.key, domain_id = %input.domain_id, "User attempted to remove an unknown domain");
            return reject(MutationError::bad_request(ErrorMessage::RemoveDomainUnknownDomain));
        };
        let Some(org) = self.load_org(ctx, &input.org_id, ACTION).await? else {
            warn!(user_key = %user.key, org_id = %input.org_id, "User attempted to remove a domain from an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::RemoveDomainUnknownOrg));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_admin) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to remove a domain without admin permission");
            return reject(MutationError::forbidden(ErrorMessage::RemoveDomainNeedsAdmin));
        };
        if org.verified && domain.archived && permission != Permission::SuperAdmin {
            warn!(user_key = %user.key, domain_key = %domain.key, "User attempted to remove an archived domain of a verified organization");
            return reject(MutationError::forbidden(ErrorMessage::RemoveDomainNeedsSuperAdmin));
        }

        let claimed = self
            .claims
            .find(org.key, domain.key)
            .await
            .or_unable_to(ACTION)?;
        if claimed.is_none() {
            warn!(user_key = %user.key, org_key = %org.key, domain_key = %domain.key, "User attempted to remove a domain the organization does not claim");
            return reject(MutationError::bad_request(ErrorMessage::RemoveDomainNotClaimed));
        }

        let steps = self.unclaim_steps(org.key, domain.key, false, ACTION).await?;
        self.write(steps, ACTION).await?;
        ctx.loaders.clear_domain(&domain).await;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                action: AuditAction::Remove,
                target: AuditTarget {
                    resource: domain.domain.clone(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::Domain,
                    updated_properties: Vec::new(),
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, org_key = %org.key, domain_key = %domain.key, "User removed domain");
        Ok(Ok(StatusPayload::new(format!(
            "Successfully removed domain: {} from {}.",
            domain.domain,
            org.slug(ctx.language)
        ))))
    }

    /// Bulk claim. Items that fail are logged and skipped; the payload
    /// reports how many were added.
    pub async fn add_organizations_domains(
        &self,
        ctx: &RequestContext<C>,
        input: AddOrganizationsDomainsInput,
    ) -> MutationResult<BulkAddPayload> {
        const ACTION: &str = "add domains";
        let user = self.verified_user(ctx).await?;

        let Some(org) = self.load_org(ctx, &input.org_id, ACTION).await? else {
            warn!(user_key = %user.key, org_id = %input.org_id, "User attempted to add domains to an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::BulkDomainsUnknownOrg));
        };
        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_admin) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to add domains without admin permission");
            return reject(MutationError::forbidden(ErrorMessage::BulkDomainsNeedsAdmin));
        };

        let tags = clean_tags(input.tags_new_domains);
        let mut added = 0u64;
        for raw in &input.domains {
            let name = clean_domain_name(raw);
            if !is_valid_domain_name(&name) {
                warn!(user_key = %user.key, domain = %raw, "Skipping invalid domain in bulk add");
                continue;
            }
            let claim = ClaimRequest {
                name: name.clone(),
                selectors: Vec::new(),
                attributes: ClaimAttributes {
                    tags: tags.clone(),
                    hidden: input.hide_new_domains,
                    asset_state: input.asset_state,
                },
                archived: false,
            };
            let domain = match self.claim_domain(ctx, &user, &org, claim, ACTION).await {
                Ok(ClaimOutcome::Added(domain)) => domain,
                Ok(ClaimOutcome::AlreadyClaimed) => {
                    warn!(user_key = %user.key, org_key = %org.key, domain = %name, "Skipping already claimed domain in bulk add");
                    continue;
                }
                Err(e) => {
                    error!(error = %e, domain = %name, "Unable to add domain in bulk add");
                    continue;
                }
            };
            added += 1;

            if input.audit {
                self.audit
                    .log_activity(CreateAuditLogEntry {
                        initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                        action: AuditAction::Add,
                        target: AuditTarget {
                            resource: domain.domain.clone(),
                            organization: Some(audit_org(&org, ctx.language)),
                            resource_type: ResourceType::Domain,
                            updated_properties: Vec::new(),
                        },
                        status: AuditStatus::Success,
                        reason: None,
                    })
                    .await;
            }
        }

        info!(user_key = %user.key, org_key = %org.key, added, requested = input.domains.len(), "User bulk added domains");
        Ok(Ok(BulkAddPayload {
            status: format!(
                "Successfully added {added} domain(s) to {}.",
                org.slug(ctx.language)
            ),
            added,
        }))
    }

    /// Bulk unclaim. Each domain is its own transaction; failures are
    /// collected and returned alongside the count removed.
    pub async fn remove_organizations_domains(
        &self,
        ctx: &RequestContext<C>,
        input: RemoveOrganizationsDomainsInput,
    ) -> MutationResult<BulkRemovePayload> {
        const ACTION: &str = "remove domains";
        let user = self.verified_user(ctx).await?;

        let Some(org) = self.load_org(ctx, &input.org_id, ACTION).await? else {
            warn!(user_key = %user.key, org_id = %input.org_id, "User attempted to remove domains from an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::BulkDomainsUnknownOrg));
        };
        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_admin) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to remove domains without admin permission");
            return reject(MutationError::forbidden(ErrorMessage::BulkDomainsNeedsAdmin));
        };
        if (org.verified || input.archive_domains) && permission != Permission::SuperAdmin {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to bulk remove domains of a verified organization");
            return reject(MutationError::forbidden(ErrorMessage::BulkDomainsNeedsSuperAdmin));
        }

        let mut removed = 0u64;
        let mut failures = Vec::new();
        for raw in &input.domains {
            let name = clean_domain_name(raw);
            let fail = |reason: &str| BulkFailure {
                domain: name.clone(),
                reason: reason.to_owned(),
            };

            let domain = match ctx.loaders.domain_by_name.load(name.clone()).await {
                Ok(Some(domain)) => domain,
                Ok(None) => {
                    warn!(user_key = %user.key, domain = %name, "Skipping unknown domain in bulk remove");
                    failures.push(fail("unknown domain"));
                    continue;
                }
                Err(e) => {
                    error!(error = %e, domain = %name, "Unable to load domain in bulk remove");
                    failures.push(fail("lookup failed"));
                    continue;
                }
            };

            match self.claims.find(org.key, domain.key).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(user_key = %user.key, org_key = %org.key, domain = %name, "Skipping unclaimed domain in bulk remove");
                    failures.push(fail("not claimed by organization"));
                    continue;
                }
                Err(e) => {
                    error!(error = %e, domain = %name, "Unable to check claim in bulk remove");
                    failures.push(fail("lookup failed"));
                    continue;
                }
            }

            let result = match self
                .unclaim_steps(org.key, domain.key, input.archive_domains, ACTION)
                .await
            {
                Ok(steps) => self.write(steps, ACTION).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                error!(error = %e, domain = %name, "Unable to remove domain in bulk remove");
                failures.push(fail("write failed"));
                continue;
            }
            removed += 1;
            ctx.loaders.clear_domain(&domain).await;

            if input.audit {
                self.audit
                    .log_activity(CreateAuditLogEntry {
                        initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                        action: AuditAction::Remove,
                        target: AuditTarget {
                            resource: domain.domain.clone(),
                            organization: Some(audit_org(&org, ctx.language)),
                            resource_type: ResourceType::Domain,
                            updated_properties: Vec::new(),
                        },
                        status: AuditStatus::Success,
                        reason: input.archive_domains.then(|| "archived".to_owned()),
                    })
                    .await;
            }
        }

        info!(
            user_key = %user.key,
            org_key = %org.key,
            removed,
            failed = failures.len(),
            "User bulk removed domains"
        );
        Ok(Ok(BulkRemovePayload {
            status: format!(
                "Successfully removed {removed} domain(s) from {}.",
                org.slug(ctx.language)
            ),
            removed,
            failures,
        }))
    }

    /// Queue an on-demand scan. Any member of a claiming organization may
    /// ask; the publish is best-effort.
    pub async fn request_scan(
        &self,
        ctx: &RequestContext<C>,
        domain: &str,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "request scan";
        let user = self.verified_user(ctx).await?;

        let name = clean_domain_name(domain);
        let found = ctx
            .loaders
            .domain_by_name
            .load(name.clone())
            .await
            .or_unable_to(ACTION)?;
        let Some(domain) = found else {
            warn!(user_key = %user.key, domain = %name, "User attempted to scan an unknown domain");
            return reject(MutationError::bad_request(ErrorMessage::ScanUnknownDomain));
        };

        let mut allowed = self
            .resolver
            .check_super_admin(user.key)
            .await
            .or_unable_to(ACTION)?;
        if !allowed {
            let claims = self
                .claims
                .list_for_domain(domain.key)
                .await
                .or_unable_to(ACTION)?;
            for claim in claims {
                let permission = self.permission(&user, claim.org_key, ACTION).await?;
                if permission.is_some_and(|p| p.is_member()) {
                    allowed = true;
                    break;
                }
            }
        }
        if !allowed {
            warn!(user_key = %user.key, domain_key = %domain.key, "User attempted to scan a domain they have no access to");
            return reject(MutationError::forbidden(ErrorMessage::ScanNeedsPermission));
        }

        self.publish(
            SCAN_REQUESTS,
            json!({
                "domain": domain.domain,
                "domain_key": domain.key,
                "hash": domain.hash,
                "selectors": domain.selectors,
                "user_key": user.key,
                "shared_id": Uuid::new_v4(),
            }),
        )
        .await;

        info!(user_key = %user.key, domain_key = %domain.key, "User requested a scan");
        Ok(Ok(StatusPayload::new(format!(
            "Successfully dispatched one time scan for: {}.",
            domain.domain
        ))))
    }

    pub async fn favourite_domain(
        &self,
        ctx: &RequestContext<C>,
        domain_id: &str,
    ) -> MutationResult<DomainPayload> {
        const ACTION: &str = "favourite domain";
        let user = self.current_user(ctx).await?;

        let Some(domain) = self.load_domain(ctx, domain_id, ACTION).await? else {
            warn!(user_key = %user.key, domain_id, "User attempted to favourite an unknown domain");
            return reject(MutationError::bad_request(ErrorMessage::FavouriteUnknownDomain));
        };
        if self
            .domains
            .is_favourite(user.key, domain.key)
            .await
            .or_unable_to(ACTION)?
        {
            warn!(user_key = %user.key, domain_key = %domain.key, "User attempted to favourite a domain twice");
            return reject(MutationError::bad_request(ErrorMessage::FavouriteAlreadyExists));
        }

        self.write(vec![edge::relate_favourite(user.key, domain.key)], ACTION)
            .await?;

        info!(user_key = %user.key, domain_key = %domain.key, "User favourited domain");
        Ok(Ok(DomainPayload { domain }))
    }

    pub async fn unfavourite_domain(
        &self,
        ctx: &RequestContext<C>,
        domain_id: &str,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "unfavourite domain";
        let user = self.current_user(ctx).await?;

        let Some(domain) = self.load_domain(ctx, domain_id, ACTION).await? else {
            warn!(user_key = %user.key, domain_id, "User attempted to unfavourite an unknown domain");
            return reject(MutationError::bad_request(ErrorMessage::FavouriteUnknownDomain));
        };
        if !self
            .domains
            .is_favourite(user.key, domain.key)
            .await
            .or_unable_to(ACTION)?
        {
            warn!(user_key = %user.key, domain_key = %domain.key, "User attempted to unfavourite a domain that is not a favourite");
            return reject(MutationError::bad_request(ErrorMessage::FavouriteNotFound));
        }

        self.write(vec![edge::delete_favourite(user.key, domain.key)], ACTION)
            .await?;

        info!(user_key = %user.key, domain_key = %domain.key, "User unfavourited domain");
        Ok(Ok(StatusPayload::new(format!(
            "Successfully removed domain: {} from favourites.",
            domain.domain
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            domain_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn selectors_are_normalized() {
        let cleaned = clean_selectors(vec![" Selector1 ".into(), "selector1".into(), "".into()]);
        assert_eq!(cleaned, vec!["selector1".to_string()]);
    }

    #[test]
    fn tags_are_upper_cased() {
        assert_eq!(clean_tags(vec![" new ".into(), "".into()]), vec!["NEW".to_string()]);
    }
}
