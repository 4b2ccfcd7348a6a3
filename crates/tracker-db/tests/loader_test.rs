//! Integration tests for the request-scoped loaders.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tracker_core::models::organization::{NewOrganization, OrgDetails};
use tracker_core::models::user::{Language, NewUser};
use tracker_core::transaction::{Transaction, TransactionEngine};
use tracker_db::SurrealTransactionEngine;
use tracker_db::loader::Loaders;
use tracker_db::statement::{organization, user};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tracker_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn loads_users_by_key_and_name() {
    let db = setup().await;
    let input = NewUser {
        key: Uuid::new_v4(),
        user_name: "loader@example.ca".into(),
        display_name: "Loader".into(),
        password_hash: "hash".into(),
        preferred_lang: Language::English,
    };
    let engine = SurrealTransactionEngine::new(db.clone());
    let mut tx = engine.begin().await.unwrap();
    tx.step(user::insert(&input)).await.unwrap();
    tx.commit().await.unwrap();

    let loaders = Loaders::new(&db);
    let (by_key, by_name, missing) = tokio::join!(
        loaders.user_by_key.load(input.key),
        loaders.user_by_user_name.load("loader@example.ca".to_string()),
        loaders.user_by_key.load(Uuid::new_v4()),
    );
    assert_eq!(by_key.unwrap().unwrap().user_name, "loader@example.ca");
    assert_eq!(by_name.unwrap().unwrap().key, input.key);
    assert!(missing.unwrap().is_none());
}

#[tokio::test]
async fn cleared_org_is_reloaded_after_write() {
    let db = setup().await;
    let details = |slug: &str, name: &str| OrgDetails {
        slug: slug.into(),
        name: name.into(),
        acronym: "A".into(),
        ..Default::default()
    };
    let input = NewOrganization {
        key: Uuid::new_v4(),
        verified: false,
        externally_managed: false,
        external_id: None,
        en: details("acme", "Acme"),
        fr: details("acme-fr", "Acme FR"),
    };
    let engine = SurrealTransactionEngine::new(db.clone());
    let mut tx = engine.begin().await.unwrap();
    tx.step(organization::insert(&input)).await.unwrap();
    tx.commit().await.unwrap();

    let loaders = Loaders::new(&db);
    let org = loaders.org_by_slug.load("acme-fr".into()).await.unwrap().unwrap();
    assert!(!org.verified);

    let mut tx = engine.begin().await.unwrap();
    tx.step(organization::set_verified(org.key, true)).await.unwrap();
    tx.commit().await.unwrap();

    let cached = loaders.org_by_slug.load("acme-fr".into()).await.unwrap().unwrap();
    assert!(!cached.verified);

    loaders.clear_org(&org).await;
    let fresh = loaders.org_by_slug.load("acme".into()).await.unwrap().unwrap();
    assert!(fresh.verified);
}
