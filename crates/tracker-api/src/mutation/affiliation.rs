//! Inviting, removing and re-roling organization members.

use surrealdb::Connection;
use tracing::{info, warn};
use tracker_auth::token;
use tracker_core::global_id::{ORGANIZATION_TYPE, USER_TYPE, key_of};
use tracker_core::models::audit::{
    AuditAction, AuditStatus, AuditTarget, CreateAuditLogEntry, ResourceType, UpdatedProperty,
};
use tracker_core::models::permission::Permission;
use tracker_core::mutation::{ErrorMessage, MutationError, MutationResult};
use tracker_core::repository::AffiliationRepository;
use tracker_core::transaction::TransactionEngine;
use tracker_db::statement::edge;

use super::{audit_org, reject};
use crate::context::RequestContext;
use crate::error::OrUnableTo;
use crate::notify::Notification;
use crate::payload::{AffiliationPayload, StatusPayload};
use crate::service::Mutations;

#[derive(Debug, Clone)]
pub struct InviteUserToOrgInput {
    pub user_name: String,
    pub requested_role: Permission,
    /// Global ID of the organization.
    pub org_id: String,
}

#[derive(Debug, Clone)]
pub struct RemoveUserFromOrgInput {
    pub user_id: String,
    pub org_id: String,
}

#[derive(Debug, Clone)]
pub struct UpdateUserRoleInput {
    pub user_name: String,
    pub org_id: String,
    pub role: Permission,
}

#[derive(Debug, Clone)]
pub struct TransferOrgOwnershipInput {
    pub org_id: String,
    pub user_name: String,
}

impl<C: Connection, E: TransactionEngine> Mutations<C, E> {
    /// Invite a user to an organization. Someone without an account gets
    /// a sign-up token instead of an edge.
    pub async fn invite_user_to_org(
        &self,
        ctx: &RequestContext<C>,
        input: InviteUserToOrgInput,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "invite user";
        let user = self.verified_user(ctx).await?;

        let user_name = input.user_name.trim().to_lowercase();
        let org_key = key_of(&input.org_id, ORGANIZATION_TYPE);

        if user_name == user.user_name {
            warn!(user_key = %user.key, "User attempted to invite themselves to an organization");
            return reject(MutationError::bad_request(ErrorMessage::InviteSelf));
        }

        let org = match org_key {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(org) = org else {
            warn!(user_key = %user.key, org_id = %input.org_id, "User attempted to invite to an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::InviteUnknownOrg));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_admin) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to invite without admin permission");
            return reject(MutationError::forbidden(ErrorMessage::InviteNeedsAdmin));
        };

        if input.requested_role == Permission::Pending {
            warn!(user_key = %user.key, "User attempted to invite with the pending role");
            return reject(MutationError::bad_request(ErrorMessage::InvalidRole));
        }
        if !permission.can_manage(input.requested_role) {
            warn!(
                user_key = %user.key,
                org_key = %org.key,
                %permission,
                requested_role = %input.requested_role,
                "User attempted to invite with a role above their own"
            );
            return reject(MutationError::forbidden(ErrorMessage::InviteNeedsSuperAdmin));
        }

        let invitee = ctx
            .loaders
            .user_by_user_name
            .load(user_name.clone())
            .await
            .or_unable_to(ACTION)?;

        let audit = CreateAuditLogEntry {
            initiated_by: self.initiated_by(ctx, &user, Some(permission)),
            action: AuditAction::Add,
            target: AuditTarget {
                resource: user_name.clone(),
                organization: Some(audit_org(&org, ctx.language)),
                resource_type: ResourceType::User,
                updated_properties: vec![UpdatedProperty::new(
                    "permission",
                    serde_json::Value::Null,
                    input.requested_role.as_str(),
                )],
            },
            status: AuditStatus::Success,
            reason: None,
        };

        let Some(invitee) = invitee else {
            let sign_up_token =
                token::issue_sign_up_token(&user_name, org.key, input.requested_role, &self.config)
                    .or_unable_to(ACTION)?;
            self.notify(Notification::OrgInviteCreateAccount {
                user_name: user_name.clone(),
                org_name: org.name(ctx.language).to_owned(),
                sign_up_token,
                language: ctx.language,
            })
            .await;
            self.audit.log_activity(audit).await;
            info!(user_key = %user.key, org_key = %org.key, "User invited someone without an account to an organization");
            return Ok(Ok(StatusPayload::new(
                "Successfully sent invitation to service, and organization email.",
            )));
        };

        let existing = self
            .resolver
            .affiliations()
            .find(org.key, invitee.key)
            .await
            .or_unable_to(ACTION)?;

        let step = match existing {
            Some(edge) if edge.permission.is_member() => {
                warn!(
                    user_key = %user.key,
                    invitee_key = %invitee.key,
                    org_key = %org.key,
                    "User attempted to invite a user who is already affiliated"
                );
                return reject(MutationError::bad_request(ErrorMessage::InviteAlreadyAffiliated));
            }
            // Accepting an invite supersedes the invitee's own join request.
            Some(pending) => edge::set_affiliation_permission(&pending.key, input.requested_role),
            None => edge::relate_affiliation(org.key, invitee.key, input.requested_role),
        };
        self.write(vec![step], ACTION).await?;

        self.notify(Notification::OrgInvite {
            user_name: invitee.user_name.clone(),
            display_name: invitee.display_name.clone(),
            org_name: org.name(invitee.preferred_lang).to_owned(),
            language: invitee.preferred_lang,
        })
        .await;
        self.audit.log_activity(audit).await;

        info!(user_key = %user.key, invitee_key = %invitee.key, org_key = %org.key, "User invited user to organization");
        Ok(Ok(StatusPayload::new(
            "Successfully invited user to organization, and sent notification email.",
        )))
    }

    /// Ask to join an organization. Admins approve by assigning a role.
    pub async fn request_org_affiliation(
        &self,
        ctx: &RequestContext<C>,
        org_id: &str,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "request invite";
        let user = self.verified_user(ctx).await?;

        let org = match key_of(org_id, ORGANIZATION_TYPE) {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(org) = org else {
            warn!(user_key = %user.key, org_id, "User attempted to request an invite to an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::RequestUnknownOrg));
        };

        let affiliations = self.resolver.affiliations();
        match affiliations.find(org.key, user.key).await.or_unable_to(ACTION)? {
            Some(edge) if edge.permission.is_member() => {
                warn!(user_key = %user.key, org_key = %org.key, "User requested an invite to an organization they belong to");
                return reject(MutationError::bad_request(ErrorMessage::RequestAlreadyAffiliated));
            }
            Some(_) => {
                warn!(user_key = %user.key, org_key = %org.key, "User repeated a pending invite request");
                return reject(MutationError::bad_request(ErrorMessage::RequestAlreadyPending));
            }
            None => {}
        }

        self.write(
            vec![edge::relate_affiliation(org.key, user.key, Permission::Pending)],
            ACTION,
        )
        .await?;

        let admin_keys: Vec<_> = affiliations
            .list_for_org(org.key)
            .await
            .or_unable_to(ACTION)?
            .into_iter()
            .filter(|edge| edge.permission.is_admin())
            .map(|edge| edge.user_key)
            .collect();
        let admins = ctx
            .loaders
            .user_by_key
            .load_many(&admin_keys)
            .await
            .or_unable_to(ACTION)?;
        for admin in admins.into_iter().flatten() {
            self.notify(Notification::AffiliationRequested {
                admin_user_name: admin.user_name.clone(),
                requester_user_name: user.user_name.clone(),
                org_name: org.name(admin.preferred_lang).to_owned(),
                language: admin.preferred_lang,
            })
            .await;
        }

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, None),
                action: AuditAction::Add,
                target: AuditTarget {
                    resource: user.user_name.clone(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::User,
                    updated_properties: vec![UpdatedProperty::new(
                        "permission",
                        serde_json::Value::Null,
                        Permission::Pending.as_str(),
                    )],
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, org_key = %org.key, "User requested to join organization");
        Ok(Ok(StatusPayload::new(
            "Successfully requested invite to organization, and sent notification email.",
        )))
    }

    /// Remove exactly the one affiliation edge between the organization
    /// and the target user. Declining a pending request uses this too.
    pub async fn remove_user_from_org(
        &self,
        ctx: &RequestContext<C>,
        input: RemoveUserFromOrgInput,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "remove user";
        let user = self.verified_user(ctx).await?;

        let org = match key_of(&input.org_id, ORGANIZATION_TYPE) {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(org) = org else {
            warn!(user_key = %user.key, org_id = %input.org_id, "User attempted to remove a user from an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::RemoveUserUnknownOrg));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_admin) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to remove a user without admin permission");
            return reject(MutationError::forbidden(ErrorMessage::RemoveUserNeedsAdmin));
        };

        let target = match key_of(&input.user_id, USER_TYPE) {
            Some(key) => ctx.loaders.user_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(target) = target else {
            warn!(user_key = %user.key, user_id = %input.user_id, "User attempted to remove an unknown user");
            return reject(MutationError::bad_request(ErrorMessage::RemoveUserUnknownUser));
        };

        let edge = self
            .resolver
            .affiliations()
            .find(org.key, target.key)
            .await
            .or_unable_to(ACTION)?;
        let Some(edge) = edge else {
            warn!(user_key = %user.key, target_key = %target.key, org_key = %org.key, "User attempted to remove a user who is not affiliated");
            return reject(MutationError::bad_request(ErrorMessage::RemoveUserNotAffiliated));
        };

        if !permission.can_manage(edge.permission) {
            warn!(
                user_key = %user.key,
                target_key = %target.key,
                %permission,
                target_permission = %edge.permission,
                "User attempted to remove a user holding a higher role"
            );
            return reject(MutationError::forbidden(ErrorMessage::RemoveUserNeedsSuperAdmin));
        }

        self.write(vec![edge::delete_affiliation(org.key, target.key)], ACTION)
            .await?;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                action: AuditAction::Remove,
                target: AuditTarget {
                    resource: target.user_name.clone(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::User,
                    updated_properties: Vec::new(),
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, target_key = %target.key, org_key = %org.key, "User removed user from organization");
        Ok(Ok(StatusPayload::new(
            "Successfully removed user from organization.",
        )))
    }

    /// Change a member's role, or approve a pending request by giving it
    /// one. The edge is overwritten in place by its key.
    pub async fn update_user_role(
        &self,
        ctx: &RequestContext<C>,
        input: UpdateUserRoleInput,
    ) -> MutationResult<AffiliationPayload> {
        const ACTION: &str = "update user's role";
        let user = self.verified_user(ctx).await?;

        let user_name = input.user_name.trim().to_lowercase();
        if user_name == user.user_name {
            warn!(user_key = %user.key, "User attempted to update their own role");
            return reject(MutationError::bad_request(ErrorMessage::UpdateOwnRole));
        }

        let target = ctx
            .loaders
            .user_by_user_name
            .load(user_name.clone())
            .await
            .or_unable_to(ACTION)?;
        let Some(target) = target else {
            warn!(user_key = %user.key, %user_name, "User attempted to update the role of an unknown user");
            return reject(MutationError::bad_request(ErrorMessage::UpdateRoleUnknownUser));
        };

        let org = match key_of(&input.org_id, ORGANIZATION_TYPE) {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(org) = org else {
            warn!(user_key = %user.key, org_id = %input.org_id, "User attempted to update a role in an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::UpdateRoleUnknownOrg));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_admin) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to update a role without admin permission");
            return reject(MutationError::forbidden(ErrorMessage::UpdateRoleNeedsAdmin));
        };

        let edge = self
            .resolver
            .affiliations()
            .find(org.key, target.key)
            .await
            .or_unable_to(ACTION)?;
        let Some(edge) = edge else {
            warn!(user_key = %user.key, target_key = %target.key, org_key = %org.key, "User attempted to update the role of a user outside the organization");
            return reject(MutationError::bad_request(ErrorMessage::UpdateRoleNotAffiliated));
        };

        if input.role == Permission::Pending {
            warn!(user_key = %user.key, "User attempted to assign the pending role");
            return reject(MutationError::bad_request(ErrorMessage::InvalidRole));
        }
        if !permission.can_manage(edge.permission) || !permission.can_manage(input.role) {
            warn!(
                user_key = %user.key,
                target_key = %target.key,
                %permission,
                current_role = %edge.permission,
                requested_role = %input.role,
                "User attempted a role change above their own role"
            );
            return reject(MutationError::forbidden(ErrorMessage::UpdateRoleNeedsSuperAdmin));
        }

        self.write(
            vec![edge::set_affiliation_permission(&edge.key, input.role)],
            ACTION,
        )
        .await?;

        self.notify(Notification::RoleChanged {
            user_name: target.user_name.clone(),
            org_name: org.name(target.preferred_lang).to_owned(),
            old_role: edge.permission,
            new_role: input.role,
            language: target.preferred_lang,
        })
        .await;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                action: AuditAction::Update,
                target: AuditTarget {
                    resource: target.user_name.clone(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::User,
                    updated_properties: vec![UpdatedProperty::new(
                        "permission",
                        edge.permission.as_str(),
                        input.role.as_str(),
                    )],
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(
            user_key = %user.key,
            target_key = %target.key,
            org_key = %org.key,
            role = %input.role,
            "User updated user's role"
        );
        Ok(Ok(AffiliationPayload {
            status: "User role was updated successfully.".into(),
            user_key: target.key,
            org_key: org.key,
            permission: input.role,
        }))
    }

    /// Hand the owner role to another member. Every current owner other
    /// than the recipient is demoted to admin in the same transaction.
    pub async fn transfer_org_ownership(
        &self,
        ctx: &RequestContext<C>,
        input: TransferOrgOwnershipInput,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "transfer organization ownership";
        let user = self.verified_user(ctx).await?;

        let org = match key_of(&input.org_id, ORGANIZATION_TYPE) {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(org) = org else {
            warn!(user_key = %user.key, org_id = %input.org_id, "User attempted to transfer ownership of an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::TransferUnknownOrg));
        };

        let permission = self.permission(&user, org.key, ACTION).await?;
        let Some(permission) = permission.filter(Permission::is_owner) else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to transfer ownership without being owner");
            return reject(MutationError::forbidden(ErrorMessage::TransferNeedsOwner));
        };

        let user_name = input.user_name.trim().to_lowercase();
        let target = ctx
            .loaders
            .user_by_user_name
            .load(user_name.clone())
            .await
            .or_unable_to(ACTION)?;
        let Some(target) = target else {
            warn!(user_key = %user.key, %user_name, "User attempted to transfer ownership to an unknown user");
            return reject(MutationError::bad_request(ErrorMessage::TransferUnknownUser));
        };
        if target.key == user.key {
            warn!(user_key = %user.key, "User attempted to transfer ownership to themselves");
            return reject(MutationError::bad_request(ErrorMessage::TransferToSelf));
        }

        let affiliations = self.resolver.affiliations();
        let edges = affiliations.list_for_org(org.key).await.or_unable_to(ACTION)?;
        let Some(target_edge) = edges
            .iter()
            .find(|e| e.user_key == target.key && e.permission.is_member())
        else {
            warn!(user_key = %user.key, target_key = %target.key, org_key = %org.key, "User attempted to transfer ownership outside the organization");
            return reject(MutationError::bad_request(ErrorMessage::TransferNotAffiliated));
        };

        let mut steps = vec![edge::set_affiliation_permission(
            &target_edge.key,
            Permission::Owner,
        )];
        steps.extend(
            edges
                .iter()
                .filter(|e| e.permission == Permission::Owner && e.user_key != target.key)
                .map(|e| edge::set_affiliation_permission(&e.key, Permission::Admin)),
        );
        self.write(steps, ACTION).await?;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, Some(permission)),
                action: AuditAction::Update,
                target: AuditTarget {
                    resource: target.user_name.clone(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::User,
                    updated_properties: vec![UpdatedProperty::new(
                        "permission",
                        target_edge.permission.as_str(),
                        Permission::Owner.as_str(),
                    )],
                },
                status: AuditStatus::Success,
                reason: None,
            })
            .await;

        info!(user_key = %user.key, target_key = %target.key, org_key = %org.key, "User transferred organization ownership");
        Ok(Ok(StatusPayload::new(
            "Successfully transferred organization ownership.",
        )))
    }

    /// Drop the caller's own affiliation. The only owner may not leave.
    pub async fn leave_organization(
        &self,
        ctx: &RequestContext<C>,
        org_id: &str,
    ) -> MutationResult<StatusPayload> {
        const ACTION: &str = "leave organization";
        let user = self.current_user(ctx).await?;

        let org = match key_of(org_id, ORGANIZATION_TYPE) {
            Some(key) => ctx.loaders.org_by_key.load(key).await.or_unable_to(ACTION)?,
            None => None,
        };
        let Some(org) = org else {
            warn!(user_key = %user.key, org_id, "User attempted to leave an unknown organization");
            return reject(MutationError::bad_request(ErrorMessage::LeaveUnknownOrg));
        };

        let affiliations = self.resolver.affiliations();
        let Some(edge) = affiliations.find(org.key, user.key).await.or_unable_to(ACTION)? else {
            warn!(user_key = %user.key, org_key = %org.key, "User attempted to leave an organization they do not belong to");
            return reject(MutationError::bad_request(ErrorMessage::LeaveNotAffiliated));
        };

        if edge.permission == Permission::Owner {
            let owners = affiliations
                .count_with_permission(org.key, Permission::Owner)
                .await
                .or_unable_to(ACTION)?;
            if owners <= 1 {
                warn!(user_key = %user.key, org_key = %org.key, "Only owner attempted to leave organization");
                return reject(MutationError::bad_request(ErrorMessage::LeaveLastOwner));
            }
        }

        self.write(vec![edge::delete_affiliation(org.key, user.key)], ACTION)
            .await?;

        self.audit
            .log_activity(CreateAuditLogEntry {
                initiated_by: self.initiated_by(ctx, &user, Some(edge.permission)),
                action: AuditAction::Remove,
                target: AuditTarget {
                    resource: user.user_name.clone(),
                    organization: Some(audit_org(&org, ctx.language)),
                    resource_type: ResourceType::User,
                    updated_properties: Vec::new(),
                },
                status: AuditStatus::Success,
                reason: Some("left organization".into()),
            })
            .await;

        info!(user_key = %user.key, org_key = %org.key, "User left organization");
        Ok(Ok(StatusPayload::new("Successfully left organization.")))
    }
}
