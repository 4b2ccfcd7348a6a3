//! Claiming, updating and removing domains.

mod common;

use std::sync::atomic::Ordering;

use common::{domain_id, harness, ok, org_id, rejected};
use tracker_api::mutation::{
    AddOrganizationsDomainsInput, CreateDomainInput, RemoveDomainInput,
    RemoveOrganizationsDomainsInput, UpdateDomainInput,
};
use tracker_api::publish::{ADD_DOMAIN_TO_EASM, SCAN_REQUESTS};
use tracker_core::models::permission::Permission;
use tracker_core::mutation::ErrorMessage;

fn create(org: uuid::Uuid, domain: &str) -> CreateDomainInput {
    CreateDomainInput {
        org_id: org_id(org),
        domain: domain.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn creating_a_known_domain_adds_a_claim_not_a_vertex() {
    let h = harness().await;
    let a = h.seed_org("alpha").await;
    let b = h.seed_org("beta").await;
    let alice = h.member(a, "alice@example.ca", Permission::User).await;
    let bob = h.member(b, "bob@example.ca", Permission::Admin).await;

    let first = ok(h.api.create_domain(&h.ctx(alice), create(a, "canada.ca")).await);
    let second = ok(h.api.create_domain(&h.ctx(bob), create(b, " Canada.CA. ")).await);

    assert_eq!(first.domain.key, second.domain.key);
    assert_eq!(h.count("domain").await, 1);
    assert_eq!(h.count("claim").await, 2);

    let again = rejected(h.api.create_domain(&h.ctx(alice), create(a, "canada.ca")).await);
    assert_eq!(again.message, ErrorMessage::CreateDomainAlreadyClaimed);
    assert_eq!(h.count("claim").await, 2);

    assert_eq!(h.publisher.on(SCAN_REQUESTS).len(), 2);
    assert_eq!(h.publisher.on(ADD_DOMAIN_TO_EASM).len(), 2);
    assert_eq!(h.count("audit_log").await, 2);
}

#[tokio::test]
async fn create_domain_validates_input_and_permission() {
    let h = harness().await;
    let org = h.seed_org("alpha").await;
    let member = h.member(org, "user@example.ca", Permission::User).await;
    let outsider = h.seed_user("outsider@example.ca").await;

    let invalid = rejected(h.api.create_domain(&h.ctx(member), create(org, "not a domain")).await);
    assert_eq!(invalid.message, ErrorMessage::InvalidDomainName);

    let denied = rejected(h.api.create_domain(&h.ctx(outsider), create(org, "canada.ca")).await);
    assert_eq!(denied.code, 403);

    let archived = rejected(
        h.api
            .create_domain(
                &h.ctx(member),
                CreateDomainInput {
                    archived: true,
                    ..create(org, "canada.ca")
                },
            )
            .await,
    );
    assert_eq!(archived.message, ErrorMessage::ArchiveDomainNeedsSuperAdmin);
    assert_eq!(h.count("domain").await, 0);
}

#[tokio::test]
async fn removing_the_last_claim_deletes_the_domain_and_its_scans() {
    let h = harness().await;
    let a = h.seed_org("alpha").await;
    let b = h.seed_org("beta").await;
    let admin = h.member(a, "admin@example.ca", Permission::Admin).await;
    h.affiliate(b, admin, Permission::Admin).await;

    let domain = h.seed_domain("canada.ca").await;
    h.claim(a, domain).await;
    h.claim(b, domain).await;
    h.run(&format!(
        "CREATE web:w1 SET url = 'canada.ca'; \
         RELATE domain:`{domain}` -> domains_web -> web:w1; \
         CREATE web_scan:s1 SET ok = true; \
         RELATE web:w1 -> web_to_web_scans -> web_scan:s1; \
         CREATE dns:d1 SET ok = true; \
         RELATE domain:`{domain}` -> domains_dns -> dns:d1;"
    ))
    .await;

    ok(h.api
        .remove_domain(
            &h.ctx(admin),
            RemoveDomainInput {
                domain_id: domain_id(domain),
                org_id: org_id(a),
            },
        )
        .await);
    assert_eq!(h.count("domain").await, 1);
    assert_eq!(h.count("claim").await, 1);
    assert_eq!(h.count("web").await, 1);

    ok(h.api
        .remove_domain(
            &h.ctx(admin),
            RemoveDomainInput {
                domain_id: domain_id(domain),
                org_id: org_id(b),
            },
        )
        .await);
    for table in ["domain", "claim", "web", "web_scan", "dns", "domains_web", "domains_dns"] {
        assert_eq!(h.count(table).await, 0, "{table} should be empty");
    }
}

#[tokio::test]
async fn removing_an_unclaimed_domain_is_rejected() {
    let h = harness().await;
    let a = h.seed_org("alpha").await;
    let b = h.seed_org("beta").await;
    let admin = h.member(a, "admin@example.ca", Permission::Admin).await;
    let domain = h.seed_domain("canada.ca").await;
    h.claim(b, domain).await;

    let err = rejected(
        h.api
            .remove_domain(
                &h.ctx(admin),
                RemoveDomainInput {
                    domain_id: domain_id(domain),
                    org_id: org_id(a),
                },
            )
            .await,
    );
    assert_eq!(err.message, ErrorMessage::RemoveDomainNotClaimed);
    assert_eq!(h.count("claim").await, 1);
}

#[tokio::test]
async fn update_domain_renames_and_retags() {
    let h = harness().await;
    let org = h.seed_org("alpha").await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;
    let domain = h.seed_domain("old.canada.ca").await;
    h.claim(org, domain).await;
    h.seed_domain("taken.canada.ca").await;

    let taken = rejected(
        h.api
            .update_domain(
                &h.ctx(admin),
                UpdateDomainInput {
                    domain_id: domain_id(domain),
                    org_id: org_id(org),
                    domain: Some("taken.canada.ca".into()),
                    ..Default::default()
                },
            )
            .await,
    );
    assert_eq!(taken.message, ErrorMessage::DomainNameInUse);

    let updated = ok(h
        .api
        .update_domain(
            &h.ctx(admin),
            UpdateDomainInput {
                domain_id: domain_id(domain),
                org_id: org_id(org),
                domain: Some("new.canada.ca".into()),
                tags: Some(vec!["prod".into()]),
                ..Default::default()
            },
        )
        .await);
    assert_eq!(updated.domain.domain, "new.canada.ca");
    assert_eq!(updated.domain.hash, tracker_api::mutation::domain::domain_hash("new.canada.ca"));
    assert_eq!(
        h.count_where("claim", "tags CONTAINS 'PROD'").await,
        1
    );
}

#[tokio::test]
async fn bulk_add_skips_bad_and_duplicate_items() {
    let h = harness().await;
    let org = h.seed_org("alpha").await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;

    let payload = ok(h
        .api
        .add_organizations_domains(
            &h.ctx(admin),
            AddOrganizationsDomainsInput {
                org_id: org_id(org),
                domains: vec![
                    "a.canada.ca".into(),
                    "not a domain".into(),
                    "A.canada.ca".into(),
                    "b.canada.ca".into(),
                ],
                audit: true,
                ..Default::default()
            },
        )
        .await);
    assert_eq!(payload.added, 2);
    assert_eq!(h.count("domain").await, 2);
    assert_eq!(h.count("claim").await, 2);
    assert_eq!(h.count("audit_log").await, 2);
}

#[tokio::test]
async fn bulk_add_needs_admin() {
    let h = harness().await;
    let org = h.seed_org("alpha").await;
    let member = h.member(org, "user@example.ca", Permission::User).await;

    let err = rejected(
        h.api
            .add_organizations_domains(
                &h.ctx(member),
                AddOrganizationsDomainsInput {
                    org_id: org_id(org),
                    domains: vec!["a.canada.ca".into()],
                    ..Default::default()
                },
            )
            .await,
    );
    assert_eq!(err.message, ErrorMessage::BulkDomainsNeedsAdmin);
}

#[tokio::test]
async fn bulk_remove_reports_each_failure() {
    let h = harness().await;
    let org = h.seed_org("alpha").await;
    let other = h.seed_org("beta").await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;

    let mine = h.seed_domain("mine.canada.ca").await;
    h.claim(org, mine).await;
    let theirs = h.seed_domain("theirs.canada.ca").await;
    h.claim(other, theirs).await;

    let payload = ok(h
        .api
        .remove_organizations_domains(
            &h.ctx(admin),
            RemoveOrganizationsDomainsInput {
                org_id: org_id(org),
                domains: vec![
                    "mine.canada.ca".into(),
                    "theirs.canada.ca".into(),
                    "unknown.canada.ca".into(),
                ],
                ..Default::default()
            },
        )
        .await);
    assert_eq!(payload.removed, 1);
    let failed: Vec<_> = payload.failures.iter().map(|f| f.domain.as_str()).collect();
    assert_eq!(failed, ["theirs.canada.ca", "unknown.canada.ca"]);
    assert_eq!(h.domain_archived(mine).await, None);
    assert_eq!(h.domain_archived(theirs).await, Some(false));
}

#[tokio::test]
async fn bulk_remove_of_a_verified_org_needs_super_admin() {
    let h = harness().await;
    let org = h.seed_org("alpha").await;
    h.verify_org(org).await;
    let admin = h.member(org, "admin@example.ca", Permission::Admin).await;
    let root = h.super_admin("root@example.ca").await;
    let domain = h.seed_domain("canada.ca").await;
    h.claim(org, domain).await;

    let input = RemoveOrganizationsDomainsInput {
        org_id: org_id(org),
        domains: vec!["canada.ca".into()],
        archive_domains: true,
        ..Default::default()
    };
    let err = rejected(
        h.api
            .remove_organizations_domains(&h.ctx(admin), input.clone())
            .await,
    );
    assert_eq!(err.message, ErrorMessage::BulkDomainsNeedsSuperAdmin);

    let payload = ok(h.api.remove_organizations_domains(&h.ctx(root), input).await);
    assert_eq!(payload.removed, 1);
    assert_eq!(h.domain_archived(domain).await, Some(true));
}

#[tokio::test]
async fn scans_are_limited_to_claiming_members() {
    let h = harness().await;
    let org = h.seed_org("alpha").await;
    let member = h.member(org, "user@example.ca", Permission::User).await;
    let outsider = h.seed_user("outsider@example.ca").await;
    let domain = h.seed_domain("canada.ca").await;
    h.claim(org, domain).await;

    let err = rejected(h.api.request_scan(&h.ctx(outsider), "canada.ca").await);
    assert_eq!(err.message, ErrorMessage::ScanNeedsPermission);
    assert!(h.publisher.on(SCAN_REQUESTS).is_empty());

    ok(h.api.request_scan(&h.ctx(member), "canada.ca").await);
    let published = h.publisher.on(SCAN_REQUESTS);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["domain"], "canada.ca");
}

#[tokio::test]
async fn favourites_toggle_once() {
    let h = harness().await;
    let user = h.seed_user("user@example.ca").await;
    let domain = h.seed_domain("canada.ca").await;

    let missing = rejected(h.api.unfavourite_domain(&h.ctx(user), &domain_id(domain)).await);
    assert_eq!(missing.message, ErrorMessage::FavouriteNotFound);

    ok(h.api.favourite_domain(&h.ctx(user), &domain_id(domain)).await);
    let twice = rejected(h.api.favourite_domain(&h.ctx(user), &domain_id(domain)).await);
    assert_eq!(twice.message, ErrorMessage::FavouriteAlreadyExists);
    assert_eq!(h.count("favourite").await, 1);

    ok(h.api.unfavourite_domain(&h.ctx(user), &domain_id(domain)).await);
    assert_eq!(h.count("favourite").await, 0);
}

#[tokio::test]
async fn claim_survives_an_unreachable_broker() {
    let h = harness().await;
    let org = h.seed_org("alpha").await;
    let member = h.member(org, "user@example.ca", Permission::User).await;
    h.publisher.fail.store(true, Ordering::SeqCst);

    let payload = ok(h.api.create_domain(&h.ctx(member), create(org, "canada.ca")).await);

    assert_eq!(payload.domain.domain, "canada.ca");
    assert_eq!(h.count("domain").await, 1);
    assert_eq!(h.count("claim").await, 1);
    assert_eq!(h.count("audit_log").await, 1);
    assert!(h.publisher.on(SCAN_REQUESTS).is_empty());
}
