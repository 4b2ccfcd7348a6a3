//! Integration tests for the SurrealDB transaction engine.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use surrealdb_types::SurrealValue;
use tracker_core::models::permission::Permission;
use tracker_core::transaction::{Statement, Transaction, TransactionEngine};
use tracker_db::SurrealTransactionEngine;
use tracker_db::statement::edge;
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tracker_db::run_migrations(&db).await.unwrap();
    db
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

fn create_user(key: Uuid, name: &str) -> Statement {
    Statement::new(
        "CREATE type::record('user', $id) SET user_name = $name, \
         display_name = $name, password_hash = 'x', preferred_lang = 'english'",
    )
    .bind("id", key.to_string())
    .bind("name", name)
}

#[tokio::test]
async fn nothing_is_written_before_commit() {
    let db = setup().await;
    let engine = SurrealTransactionEngine::new(db.clone());

    let mut tx = engine.begin().await.unwrap();
    tx.step(create_user(Uuid::new_v4(), "a@example.ca")).await.unwrap();
    assert_eq!(count(&db, "user").await, 0);

    tx.commit().await.unwrap();
    assert_eq!(count(&db, "user").await, 1);
}

#[tokio::test]
async fn steps_may_reuse_parameter_names() {
    let db = setup().await;
    let engine = SurrealTransactionEngine::new(db.clone());

    let mut tx = engine.begin().await.unwrap();
    tx.step(create_user(Uuid::new_v4(), "a@example.ca")).await.unwrap();
    tx.step(create_user(Uuid::new_v4(), "b@example.ca")).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(count(&db, "user").await, 2);
}

#[tokio::test]
async fn failing_step_cancels_the_whole_transaction() {
    let db = setup().await;
    let engine = SurrealTransactionEngine::new(db.clone());

    let mut tx = engine.begin().await.unwrap();
    tx.step(create_user(Uuid::new_v4(), "a@example.ca")).await.unwrap();
    // Duplicate user name violates the unique index.
    tx.step(create_user(Uuid::new_v4(), "a@example.ca")).await.unwrap();

    assert!(tx.commit().await.is_err());
    assert_eq!(count(&db, "user").await, 0);
}

#[tokio::test]
async fn aborted_transaction_rejects_further_use() {
    let db = setup().await;
    let engine = SurrealTransactionEngine::new(db.clone());

    let mut tx = engine.begin().await.unwrap();
    tx.step(create_user(Uuid::new_v4(), "a@example.ca")).await.unwrap();
    tx.abort().await;

    assert!(tx.step(create_user(Uuid::new_v4(), "b@example.ca")).await.is_err());
    assert!(tx.commit().await.is_err());
    assert_eq!(count(&db, "user").await, 0);
}

#[tokio::test]
async fn duplicate_affiliation_edge_is_rejected() {
    let db = setup().await;
    let engine = SurrealTransactionEngine::new(db.clone());
    let org = Uuid::new_v4();
    let user = Uuid::new_v4();

    db.query(format!(
        "CREATE organization:`{org}` SET slug_en = 'o', slug_fr = 'o-fr', \
         acronym_en = 'O', acronym_fr = 'O', name_en = 'O', name_fr = 'O'"
    ))
    .await
    .unwrap()
    .check()
    .unwrap();

    let mut tx = engine.begin().await.unwrap();
    tx.step(create_user(user, "a@example.ca")).await.unwrap();
    tx.step(edge::relate_affiliation(org, user, Permission::User))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = engine.begin().await.unwrap();
    tx.step(edge::relate_affiliation(org, user, Permission::Admin))
        .await
        .unwrap();
    assert!(tx.commit().await.is_err());
    assert_eq!(count(&db, "affiliation").await, 1);
}
