//! Inviting, re-roling, transferring and leaving organizations.

mod common;

use common::{harness, ok, org_id, rejected, user_id};
use tracker_api::Notification;
use tracker_api::mutation::{
    InviteUserToOrgInput, RemoveUserFromOrgInput, TransferOrgOwnershipInput, UpdateUserRoleInput,
};
use tracker_core::models::permission::Permission;
use tracker_core::mutation::ErrorMessage;

#[tokio::test]
async fn lower_roles_cannot_assign_higher_roles() {
    let h = harness().await;
    let actors = [Permission::User, Permission::Admin, Permission::Owner];

    for (i, actor_role) in actors.into_iter().enumerate() {
        let org = h.seed_org(&format!("org{i}")).await;
        let actor = h.member(org, &format!("actor{i}@example.ca"), actor_role).await;
        let target = h.member(org, &format!("target{i}@example.ca"), Permission::User).await;

        for requested in Permission::hierarchy()
            .iter()
            .copied()
            .filter(|r| *r > actor_role)
        {
            let err = rejected(
                h.api
                    .update_user_role(
                        &h.ctx(actor),
                        UpdateUserRoleInput {
                            user_name: format!("target{i}@example.ca"),
                            org_id: org_id(org),
                            role: requested,
                        },
                    )
                    .await,
            );
            assert_eq!(err.code, 403, "{actor_role} assigning {requested}");
            assert_eq!(h.affiliation(org, target).await, Some(Permission::User));
        }
    }
}

#[tokio::test]
async fn admin_cannot_grant_super_admin() {
    let h = harness().await;
    let org = h.seed_org("acme").await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;
    let target = h.member(org, "user@example.ca", Permission::User).await;

    let err = rejected(
        h.api
            .update_user_role(
                &h.ctx(admin),
                UpdateUserRoleInput {
                    user_name: "user@example.ca".into(),
                    org_id: org_id(org),
                    role: Permission::SuperAdmin,
                },
            )
            .await,
    );
    assert_eq!(err.code, 403);
    assert_eq!(err.message, ErrorMessage::UpdateRoleNeedsSuperAdmin);
    assert_eq!(h.affiliation(org, target).await, Some(Permission::User));
    assert_eq!(h.count("audit_log").await, 0);
}

#[tokio::test]
async fn super_admin_may_promote_to_owner() {
    let h = harness().await;
    let org = h.seed_org("acme").await;
    let root = h.super_admin("root@example.ca").await;
    let target = h.member(org, "user@example.ca", Permission::User).await;

    let payload = ok(h
        .api
        .update_user_role(
            &h.ctx(root),
            UpdateUserRoleInput {
                user_name: "user@example.ca".into(),
                org_id: org_id(org),
                role: Permission::Owner,
            },
        )
        .await);
    assert_eq!(payload.permission, Permission::Owner);
    assert_eq!(h.affiliation(org, target).await, Some(Permission::Owner));
    assert!(h.notifier.sent().iter().any(|n| matches!(
        n,
        Notification::RoleChanged { new_role: Permission::Owner, .. }
    )));
    assert_eq!(h.count("audit_log").await, 1);
}

#[tokio::test]
async fn inviting_an_affiliated_user_creates_no_second_edge() {
    let h = harness().await;
    let org = h.seed_org("acme").await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;
    let member = h.member(org, "user@example.ca", Permission::User).await;

    let err = rejected(
        h.api
            .invite_user_to_org(
                &h.ctx(admin),
                InviteUserToOrgInput {
                    user_name: "USER@example.ca".into(),
                    requested_role: Permission::Admin,
                    org_id: org_id(org),
                },
            )
            .await,
    );
    assert_eq!(err.message, ErrorMessage::InviteAlreadyAffiliated);
    assert_eq!(
        h.count_where("affiliation", &format!("out = user:`{member}`"))
            .await,
        1
    );
    assert_eq!(h.affiliation(org, member).await, Some(Permission::User));
}

#[tokio::test]
async fn invite_supersedes_a_pending_request() {
    let h = harness().await;
    let org = h.seed_org("acme").await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;
    let applicant = h.seed_user("applicant@example.ca").await;

    ok(h.api.request_org_affiliation(&h.ctx(applicant), &org_id(org)).await);
    assert_eq!(h.affiliation(org, applicant).await, Some(Permission::Pending));
    assert!(h.notifier.sent().iter().any(|n| matches!(
        n,
        Notification::AffiliationRequested { admin_user_name, .. } if admin_user_name == "admin@example.ca"
    )));

    let again = rejected(h.api.request_org_affiliation(&h.ctx(applicant), &org_id(org)).await);
    assert_eq!(again.message, ErrorMessage::RequestAlreadyPending);

    ok(h.api
        .invite_user_to_org(
            &h.ctx(admin),
            InviteUserToOrgInput {
                user_name: "applicant@example.ca".into(),
                requested_role: Permission::User,
                org_id: org_id(org),
            },
        )
        .await);
    assert_eq!(h.affiliation(org, applicant).await, Some(Permission::User));
    assert_eq!(
        h.count_where("affiliation", &format!("out = user:`{applicant}`"))
            .await,
        1
    );
}

#[tokio::test]
async fn inviting_someone_without_an_account_mails_a_sign_up_token() {
    let h = harness().await;
    let org = h.seed_org("acme").await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;

    ok(h.api
        .invite_user_to_org(
            &h.ctx(admin),
            InviteUserToOrgInput {
                user_name: "new@example.ca".into(),
                requested_role: Permission::User,
                org_id: org_id(org),
            },
        )
        .await);

    let sent = h.notifier.sent();
    assert!(matches!(
        sent.as_slice(),
        [Notification::OrgInviteCreateAccount { user_name, .. }] if user_name == "new@example.ca"
    ));
    assert_eq!(h.count("affiliation").await, 1);
}

#[tokio::test]
async fn users_cannot_invite_themselves() {
    let h = harness().await;
    let org = h.seed_org("acme").await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;

    let err = rejected(
        h.api
            .invite_user_to_org(
                &h.ctx(admin),
                InviteUserToOrgInput {
                    user_name: "admin@example.ca".into(),
                    requested_role: Permission::User,
                    org_id: org_id(org),
                },
            )
            .await,
    );
    assert_eq!(err.message, ErrorMessage::InviteSelf);
}

#[tokio::test]
async fn admin_cannot_remove_an_owner() {
    let h = harness().await;
    let org = h.seed_org("acme").await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;
    let owner = h.member(org, "owner@example.ca", Permission::Owner).await;
    let member = h.member(org, "user@example.ca", Permission::User).await;

    let err = rejected(
        h.api
            .remove_user_from_org(
                &h.ctx(admin),
                RemoveUserFromOrgInput {
                    user_id: user_id(owner),
                    org_id: org_id(org),
                },
            )
            .await,
    );
    assert_eq!(err.code, 403);
    assert_eq!(h.affiliation(org, owner).await, Some(Permission::Owner));

    ok(h.api
        .remove_user_from_org(
            &h.ctx(admin),
            RemoveUserFromOrgInput {
                user_id: user_id(member),
                org_id: org_id(org),
            },
        )
        .await);
    assert_eq!(h.affiliation(org, member).await, None);
}

#[tokio::test]
async fn transfer_demotes_the_previous_owner() {
    let h = harness().await;
    let org = h.seed_org("acme").await;
    let owner = h.member(org, "owner@example.ca", Permission::Owner).await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;

    let err = rejected(
        h.api
            .transfer_org_ownership(
                &h.ctx(admin),
                TransferOrgOwnershipInput {
                    org_id: org_id(org),
                    user_name: "admin@example.ca".into(),
                },
            )
            .await,
    );
    assert_eq!(err.message, ErrorMessage::TransferNeedsOwner);

    ok(h.api
        .transfer_org_ownership(
            &h.ctx(owner),
            TransferOrgOwnershipInput {
                org_id: org_id(org),
                user_name: "admin@example.ca".into(),
            },
        )
        .await);
    assert_eq!(h.affiliation(org, admin).await, Some(Permission::Owner));
    assert_eq!(h.affiliation(org, owner).await, Some(Permission::Admin));
}

#[tokio::test]
async fn the_only_owner_cannot_leave() {
    let h = harness().await;
    let org = h.seed_org("acme").await;
    let owner = h.member(org, "owner@example.ca", Permission::Owner).await;
    let member = h.member(org, "user@example.ca", Permission::User).await;

    let err = rejected(h.api.leave_organization(&h.ctx(owner), &org_id(org)).await);
    assert_eq!(err.message, ErrorMessage::LeaveLastOwner);
    assert_eq!(h.affiliation(org, owner).await, Some(Permission::Owner));

    ok(h.api.leave_organization(&h.ctx(member), &org_id(org)).await);
    assert_eq!(h.affiliation(org, member).await, None);
}

#[tokio::test]
async fn removing_a_member_leaves_the_others() {
    let h = harness().await;
    let org = h.seed_org("acme").await;
    let other = h.seed_org("other").await;
    let owner = h.member(org, "owner@example.ca", Permission::Owner).await;
    let stays = h.member(org, "stays@example.ca", Permission::User).await;
    let leaves = h.member(org, "leaves@example.ca", Permission::Admin).await;
    h.affiliate(other, leaves, Permission::User).await;

    ok(h.api
        .remove_user_from_org(
            &h.ctx(owner),
            RemoveUserFromOrgInput {
                user_id: user_id(leaves),
                org_id: org_id(org),
            },
        )
        .await);

    assert_eq!(h.affiliation(org, leaves).await, None);
    assert_eq!(h.affiliation(org, owner).await, Some(Permission::Owner));
    assert_eq!(h.affiliation(org, stays).await, Some(Permission::User));
    assert_eq!(h.affiliation(other, leaves).await, Some(Permission::User));
    assert_eq!(h.count("affiliation").await, 3);
}
