//! SurrealDB implementation of [`ClaimRepository`].

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracker_core::error::TrackerResult;
use tracker_core::models::affiliation::{Claim, Ownership};
use tracker_core::repository::ClaimRepository;
use uuid::Uuid;

use super::parse_key;
use crate::error::DbError;

const SELECT_CLAIM: &str = "SELECT meta::id(id) AS record_id, \
     meta::id(in) AS org_key, meta::id(out) AS domain_key, \
     tags, hidden, asset_state, first_seen FROM claim";

#[derive(Debug, SurrealValue)]
struct ClaimRow {
    record_id: String,
    org_key: String,
    domain_key: String,
    tags: Vec<String>,
    hidden: bool,
    asset_state: String,
    first_seen: String,
}

impl ClaimRow {
    fn try_into_claim(self) -> Result<Claim, DbError> {
        Ok(Claim {
            key: self.record_id,
            org_key: parse_key(&self.org_key)?,
            domain_key: parse_key(&self.domain_key)?,
            tags: self.tags,
            hidden: self.hidden,
            asset_state: self
                .asset_state
                .parse()
                .map_err(|e| DbError::Decode(format!("{e}")))?,
            first_seen: self.first_seen,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct OwnershipRow {
    record_id: String,
    org_key: String,
    domain_key: String,
}

impl OwnershipRow {
    fn into_ownership(self) -> TrackerResult<Ownership> {
        Ok(Ownership {
            key: self.record_id,
            org_key: parse_key(&self.org_key)?,
            domain_key: parse_key(&self.domain_key)?,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the Claim repository.
pub struct SurrealClaimRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealClaimRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealClaimRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ClaimRepository for SurrealClaimRepository<C> {
    async fn find(&self, org_key: Uuid, domain_key: Uuid) -> TrackerResult<Option<Claim>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_CLAIM} WHERE in = type::record('organization', $org) \
                 AND out = type::record('domain', $domain)"
            ))
            .bind(("org", org_key.to_string()))
            .bind(("domain", domain_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClaimRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_claim()?)),
            None => Ok(None),
        }
    }

    async fn count_for_domain(&self, domain_key: Uuid) -> TrackerResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM claim \
                 WHERE out = type::record('domain', $domain) GROUP ALL",
            )
            .bind(("domain", domain_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn list_for_domain(&self, domain_key: Uuid) -> TrackerResult<Vec<Claim>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_CLAIM} WHERE out = type::record('domain', $domain)"
            ))
            .bind(("domain", domain_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClaimRow> = result.take(0).map_err(DbError::from)?;
        let claims = rows
            .into_iter()
            .map(ClaimRow::try_into_claim)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(claims)
    }

    async fn find_ownership(&self, domain_key: Uuid) -> TrackerResult<Option<Ownership>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, meta::id(in) AS org_key, \
                 meta::id(out) AS domain_key FROM ownership \
                 WHERE out = type::record('domain', $domain)",
            )
            .bind(("domain", domain_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OwnershipRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter().next().map(OwnershipRow::into_ownership).transpose()
    }

    async fn list_ownerships(&self, org_key: Uuid) -> TrackerResult<Vec<Ownership>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, meta::id(in) AS org_key, \
                 meta::id(out) AS domain_key FROM ownership \
                 WHERE in = type::record('organization', $org)",
            )
            .bind(("org", org_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OwnershipRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter().map(OwnershipRow::into_ownership).collect()
    }
}
