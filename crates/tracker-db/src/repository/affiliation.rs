//! SurrealDB implementation of [`AffiliationRepository`].

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracker_core::error::TrackerResult;
use tracker_core::models::affiliation::Affiliation;
use tracker_core::models::permission::Permission;
use tracker_core::repository::AffiliationRepository;
use uuid::Uuid;

use super::parse_key;
use crate::error::DbError;

const SELECT_AFFILIATION: &str = "SELECT meta::id(id) AS record_id, \
     meta::id(in) AS org_key, meta::id(out) AS user_key, permission FROM affiliation";

#[derive(Debug, SurrealValue)]
struct AffiliationRow {
    record_id: String,
    org_key: String,
    user_key: String,
    permission: String,
}

impl AffiliationRow {
    fn try_into_affiliation(self) -> Result<Affiliation, DbError> {
        Ok(Affiliation {
            key: self.record_id,
            org_key: parse_key(&self.org_key)?,
            user_key: parse_key(&self.user_key)?,
            permission: self
                .permission
                .parse()
                .map_err(|e| DbError::Decode(format!("{e}")))?,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn into_affiliations(rows: Vec<AffiliationRow>) -> TrackerResult<Vec<Affiliation>> {
    let edges = rows
        .into_iter()
        .map(AffiliationRow::try_into_affiliation)
        .collect::<Result<Vec<_>, DbError>>()?;
    Ok(edges)
}

/// SurrealDB implementation of the Affiliation repository.
pub struct SurrealAffiliationRepository<C: Connection> {
    db: Surreal<C>,
}

// `Surreal<C>` is Clone for any engine, so no `C: Clone` bound.
impl<C: Connection> Clone for SurrealAffiliationRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealAffiliationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AffiliationRepository for SurrealAffiliationRepository<C> {
    async fn find(&self, org_key: Uuid, user_key: Uuid) -> TrackerResult<Option<Affiliation>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_AFFILIATION} WHERE in = type::record('organization', $org) \
                 AND out = type::record('user', $user)"
            ))
            .bind(("org", org_key.to_string()))
            .bind(("user", user_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AffiliationRow> = result.take(0).map_err(DbError::from)?;
        Ok(into_affiliations(rows)?.into_iter().next())
    }

    async fn is_super_admin(&self, user_key: Uuid) -> TrackerResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM affiliation \
                 WHERE out = type::record('user', $user) \
                 AND permission = 'super_admin' GROUP ALL",
            )
            .bind(("user", user_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn list_for_org(&self, org_key: Uuid) -> TrackerResult<Vec<Affiliation>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_AFFILIATION} WHERE in = type::record('organization', $org)"
            ))
            .bind(("org", org_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AffiliationRow> = result.take(0).map_err(DbError::from)?;
        into_affiliations(rows)
    }

    async fn list_for_user(&self, user_key: Uuid) -> TrackerResult<Vec<Affiliation>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_AFFILIATION} WHERE out = type::record('user', $user)"
            ))
            .bind(("user", user_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AffiliationRow> = result.take(0).map_err(DbError::from)?;
        into_affiliations(rows)
    }

    async fn count_with_permission(
        &self,
        org_key: Uuid,
        permission: Permission,
    ) -> TrackerResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM affiliation \
                 WHERE in = type::record('organization', $org) \
                 AND permission = $permission GROUP ALL",
            )
            .bind(("org", org_key.to_string()))
            .bind(("permission", permission.as_str()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
