//! Integration tests for the repositories and write statements using
//! in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use surrealdb_types::SurrealValue;
use tracker_core::models::affiliation::ClaimAttributes;
use tracker_core::models::audit::{
    AuditAction, AuditOrganization, AuditStatus, AuditTarget, CreateAuditLogEntry, InitiatedBy,
    ResourceType,
};
use tracker_core::models::domain::{AssetState, NewDomain};
use tracker_core::models::organization::{NewOrganization, OrgDetails};
use tracker_core::models::permission::Permission;
use tracker_core::models::user::{Language, NewUser, TfaSendMethod, UpdateUser};
use tracker_core::repository::{
    AffiliationRepository, AuditLogFilter, AuditLogRepository, ClaimRepository, DomainRepository,
    OrganizationRepository, Pagination, UserRepository,
};
use tracker_core::transaction::{Statement, Transaction, TransactionEngine};
use tracker_db::SurrealTransactionEngine;
use tracker_db::repository::{
    SurrealAffiliationRepository, SurrealAuditLogRepository, SurrealClaimRepository,
    SurrealDomainRepository, SurrealOrganizationRepository, SurrealUserRepository,
};
use tracker_db::statement::{audit, domain, edge, organization, user};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tracker_db::run_migrations(&db).await.unwrap();
    db
}

async fn apply(db: &Surreal<Db>, statements: Vec<Statement>) {
    let engine = SurrealTransactionEngine::new(db.clone());
    let mut tx = engine.begin().await.unwrap();
    for statement in statements {
        tx.step(statement).await.unwrap();
    }
    tx.commit().await.unwrap();
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

async fn count(db: &Surreal<Db>, table: &str) -> u64 {
    let mut result = db
        .query(format!("SELECT count() AS total FROM {table} GROUP ALL"))
        .await
        .unwrap();
    let rows: Vec<CountRow> = result.take(0).unwrap();
    rows.first().map(|r| r.total).unwrap_or(0)
}

fn new_user(name: &str) -> NewUser {
    NewUser {
        key: Uuid::new_v4(),
        user_name: name.into(),
        display_name: "Test User".into(),
        password_hash: "hash".into(),
        preferred_lang: Language::English,
    }
}

fn new_org(name: &str) -> NewOrganization {
    let details = |suffix: &str| OrgDetails {
        slug: format!("{}-{suffix}", name.to_lowercase()),
        acronym: name.to_uppercase(),
        name: format!("{name} {suffix}"),
        ..Default::default()
    };
    NewOrganization {
        key: Uuid::new_v4(),
        verified: false,
        externally_managed: false,
        external_id: None,
        en: details("en"),
        fr: details("fr"),
    }
}

fn new_domain(name: &str) -> NewDomain {
    NewDomain {
        key: Uuid::new_v4(),
        domain: name.into(),
        hash: format!("hash-{name}"),
        selectors: vec!["selector1".into()],
        archived: false,
    }
}

// -----------------------------------------------------------------------
// Users
// -----------------------------------------------------------------------

#[tokio::test]
async fn user_lookup_is_case_insensitive() {
    let db = setup().await;
    let input = new_user("Mixed@Case.CA");
    apply(&db, vec![user::insert(&input)]).await;

    let repo = SurrealUserRepository::new(db);
    let found = repo.get_by_user_name("mixed@CASE.ca").await.unwrap().unwrap();
    assert_eq!(found.key, input.key);
    assert_eq!(found.user_name, "mixed@case.ca");
    assert_eq!(found.tfa_send_method, TfaSendMethod::None);
    assert_eq!(found.failed_login_attempts, 0);
    assert!(found.refresh_info.is_none());
}

#[tokio::test]
async fn user_update_sets_and_clears_options() {
    let db = setup().await;
    let input = new_user("a@example.ca");
    apply(&db, vec![user::insert(&input)]).await;

    let set = UpdateUser {
        tfa_code: Some(Some("123456".into())),
        failed_login_attempts: Some(3),
        preferred_lang: Some(Language::French),
        ..Default::default()
    };
    apply(&db, vec![user::update(input.key, &set).unwrap()]).await;

    let repo = SurrealUserRepository::new(db.clone());
    let stored = repo.get_by_key(input.key).await.unwrap().unwrap();
    assert_eq!(stored.tfa_code.as_deref(), Some("123456"));
    assert_eq!(stored.failed_login_attempts, 3);
    assert_eq!(stored.preferred_lang, Language::French);

    let clear = UpdateUser {
        tfa_code: Some(None),
        ..Default::default()
    };
    apply(&db, vec![user::update(input.key, &clear).unwrap()]).await;
    let stored = repo.get_by_key(input.key).await.unwrap().unwrap();
    assert!(stored.tfa_code.is_none());
}

#[tokio::test]
async fn missing_user_is_none() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);
    assert!(repo.get_by_key(Uuid::new_v4()).await.unwrap().is_none());
    assert!(repo.get_many(&[]).await.unwrap().is_empty());
}

// -----------------------------------------------------------------------
// Organizations
// -----------------------------------------------------------------------

#[tokio::test]
async fn organization_found_by_either_slug() {
    let db = setup().await;
    let input = new_org("Acme");
    apply(&db, vec![organization::insert(&input)]).await;

    let repo = SurrealOrganizationRepository::new(db);
    let by_en = repo.get_by_slug("acme-en").await.unwrap().unwrap();
    let by_fr = repo.get_by_slug("acme-fr").await.unwrap().unwrap();
    assert_eq!(by_en.key, input.key);
    assert_eq!(by_fr.key, input.key);
    assert_eq!(by_en.fr.name, "Acme fr");

    let many = repo
        .get_many_by_slug(&["acme-fr".into(), "unknown".into()])
        .await
        .unwrap();
    assert_eq!(many.len(), 1);
}

#[tokio::test]
async fn organization_name_collision_ignores_case_and_excluded_org() {
    let db = setup().await;
    let input = new_org("Acme");
    apply(&db, vec![organization::insert(&input)]).await;

    let repo = SurrealOrganizationRepository::new(db);
    assert!(repo.name_in_use("ACME EN", "other", None).await.unwrap());
    assert!(repo.name_in_use("other", "acme fr", None).await.unwrap());
    assert!(!repo.name_in_use("other", "other", None).await.unwrap());
    assert!(
        !repo
            .name_in_use("Acme en", "Acme fr", Some(input.key))
            .await
            .unwrap()
    );
}

// -----------------------------------------------------------------------
// Edges
// -----------------------------------------------------------------------

#[tokio::test]
async fn affiliation_find_update_and_super_admin() {
    let db = setup().await;
    let org = new_org("Acme");
    let member = new_user("a@example.ca");
    apply(
        &db,
        vec![
            organization::insert(&org),
            user::insert(&member),
            edge::relate_affiliation(org.key, member.key, Permission::User),
        ],
    )
    .await;

    let repo = SurrealAffiliationRepository::new(db.clone());
    let found = repo.find(org.key, member.key).await.unwrap().unwrap();
    assert_eq!(found.permission, Permission::User);
    assert!(!repo.is_super_admin(member.key).await.unwrap());

    apply(
        &db,
        vec![edge::set_affiliation_permission(
            &found.key,
            Permission::SuperAdmin,
        )],
    )
    .await;

    let updated = repo.find(org.key, member.key).await.unwrap().unwrap();
    assert_eq!(updated.key, found.key);
    assert_eq!(updated.permission, Permission::SuperAdmin);
    assert!(repo.is_super_admin(member.key).await.unwrap());
    assert_eq!(
        repo.count_with_permission(org.key, Permission::SuperAdmin)
            .await
            .unwrap(),
        1
    );
    assert_eq!(repo.list_for_user(member.key).await.unwrap().len(), 1);

    apply(&db, vec![edge::delete_affiliation(org.key, member.key)]).await;
    assert!(repo.find(org.key, member.key).await.unwrap().is_none());
}

#[tokio::test]
async fn claim_counts_cover_every_claiming_org() {
    let db = setup().await;
    let a = new_org("Alpha");
    let b = new_org("Beta");
    let shared = new_domain("shared.ca");
    let solo = new_domain("solo.ca");
    let attrs = ClaimAttributes {
        tags: vec!["prod".into()],
        hidden: false,
        asset_state: AssetState::MonitorOnly,
    };
    apply(
        &db,
        vec![
            organization::insert(&a),
            organization::insert(&b),
            domain::upsert(&shared),
            domain::upsert(&solo),
            edge::relate_claim(a.key, shared.key, &attrs, "2024-01-01T00:00:00Z"),
            edge::relate_claim(b.key, shared.key, &attrs, "2024-01-01T00:00:00Z"),
            edge::relate_claim(a.key, solo.key, &attrs, "2024-01-01T00:00:00Z"),
        ],
    )
    .await;

    let orgs = SurrealOrganizationRepository::new(db.clone());
    let mut counts = orgs.domain_claim_counts(a.key).await.unwrap();
    counts.sort_by_key(|c| c.claim_count);
    assert_eq!(counts.len(), 2);
    assert_eq!((counts[0].domain_key, counts[0].claim_count), (solo.key, 1));
    assert_eq!((counts[1].domain_key, counts[1].claim_count), (shared.key, 2));

    let claims = SurrealClaimRepository::new(db);
    let claim = claims.find(b.key, shared.key).await.unwrap().unwrap();
    assert_eq!(claim.tags, vec!["prod".to_string()]);
    assert_eq!(claim.asset_state, AssetState::MonitorOnly);
    assert_eq!(claims.count_for_domain(shared.key).await.unwrap(), 2);
}

#[tokio::test]
async fn domain_upsert_keeps_one_vertex_and_merges_selectors() {
    let db = setup().await;
    let first = new_domain("example.ca");
    apply(&db, vec![domain::upsert(&first)]).await;

    let again = NewDomain {
        selectors: vec!["selector2".into()],
        ..first.clone()
    };
    apply(&db, vec![domain::upsert(&again)]).await;

    assert_eq!(count(&db, "domain").await, 1);
    let repo = SurrealDomainRepository::new(db);
    let stored = repo.get_by_name("EXAMPLE.ca.").await.unwrap().unwrap();
    assert_eq!(stored.key, first.key);
    assert_eq!(stored.selectors, vec!["selector1".to_string(), "selector2".to_string()]);
}

#[tokio::test]
async fn cascade_delete_removes_scan_data() {
    let db = setup().await;
    let org = new_org("Acme");
    let d = new_domain("cascade.ca");
    let reader = new_user("r@example.ca");
    apply(
        &db,
        vec![
            organization::insert(&org),
            domain::upsert(&d),
            user::insert(&reader),
            edge::relate_claim(org.key, d.key, &ClaimAttributes::default(), "now"),
            edge::relate_favourite(reader.key, d.key),
        ],
    )
    .await;
    let key = d.key;
    db.query(format!(
        "CREATE web:w1 SET domain = 'cascade.ca'; \
         CREATE web_scan:s1 SET status = 'done'; \
         CREATE dns:d1 SET spf = 'pass'; \
         CREATE selector:k1 SET selector = 'selector1'; \
         RELATE domain:`{key}` -> domains_web -> web:w1; \
         RELATE web:w1 -> web_to_web_scans -> web_scan:s1; \
         RELATE domain:`{key}` -> domains_dns -> dns:d1; \
         RELATE domain:`{key}` -> domains_to_selectors -> selector:k1;"
    ))
    .await
    .unwrap()
    .check()
    .unwrap();

    apply(&db, domain::cascade_delete(d.key)).await;

    for table in [
        "domain",
        "claim",
        "favourite",
        "web",
        "web_scan",
        "dns",
        "domains_web",
        "web_to_web_scans",
        "domains_dns",
        "domains_to_selectors",
    ] {
        assert_eq!(count(&db, table).await, 0, "{table} not cleaned");
    }
    assert_eq!(count(&db, "organization").await, 1);
}

#[tokio::test]
async fn ownership_cleanup_removes_dmarc_summaries() {
    let db = setup().await;
    let org = new_org("Acme");
    let d = new_domain("owned.ca");
    apply(
        &db,
        vec![
            organization::insert(&org),
            domain::upsert(&d),
            edge::relate_ownership(org.key, d.key),
        ],
    )
    .await;
    let key = d.key;
    db.query(format!(
        "CREATE dmarc_summary:m1 SET period = '2024-01'; \
         RELATE domain:`{key}` -> domains_to_dmarc_summaries -> dmarc_summary:m1;"
    ))
    .await
    .unwrap()
    .check()
    .unwrap();

    let claims = SurrealClaimRepository::new(db.clone());
    let ownership = claims.find_ownership(d.key).await.unwrap().unwrap();
    assert_eq!(ownership.org_key, org.key);

    apply(&db, domain::ownership_cleanup(org.key, d.key)).await;
    assert_eq!(count(&db, "dmarc_summary").await, 0);
    assert_eq!(count(&db, "domains_to_dmarc_summaries").await, 0);
    assert!(claims.find_ownership(d.key).await.unwrap().is_none());
}

// -----------------------------------------------------------------------
// Audit log
// -----------------------------------------------------------------------

#[tokio::test]
async fn audit_log_round_trips_record_shape() {
    let db = setup().await;
    let actor = Uuid::new_v4();
    let org = Uuid::new_v4();
    let entry = CreateAuditLogEntry {
        initiated_by: InitiatedBy {
            id: actor,
            user_name: "admin@example.ca".into(),
            role: Some(Permission::Admin),
            ip_address: None,
        },
        action: AuditAction::Update,
        target: AuditTarget {
            resource: "bob@example.ca".into(),
            organization: Some(AuditOrganization {
                id: org,
                name: "Acme".into(),
            }),
            resource_type: ResourceType::User,
            updated_properties: Vec::new(),
        },
        status: AuditStatus::Success,
        reason: Some("role change".into()),
    };
    apply(
        &db,
        vec![audit::insert(Uuid::new_v4(), "2024-01-01T00:00:00Z", &entry).unwrap()],
    )
    .await;

    let repo = SurrealAuditLogRepository::new(db);
    let page = repo
        .list(
            AuditLogFilter {
                organization: Some(org),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    let stored = &page.items[0];
    assert_eq!(stored.initiated_by.id, actor);
    assert_eq!(stored.initiated_by.role, Some(Permission::Admin));
    assert_eq!(stored.action, AuditAction::Update);
    assert_eq!(stored.reason.as_deref(), Some("role change"));

    let none = repo
        .list(
            AuditLogFilter {
                action: Some(AuditAction::Delete),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(none.total, 0);
}
