//! SurrealDB implementation of [`DomainRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracker_core::error::TrackerResult;
use tracker_core::models::domain::{Domain, DomainStatus, clean_domain_name};
use tracker_core::repository::DomainRepository;
use uuid::Uuid;

use super::parse_key;
use crate::error::DbError;

const SELECT_DOMAIN: &str = "SELECT meta::id(id) AS record_id, * FROM domain";

#[derive(Debug, SurrealValue)]
struct DomainRowWithId {
    record_id: String,
    domain: String,
    hash: String,
    status: serde_json::Value,
    archived: bool,
    selectors: Vec<String>,
    last_ran: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DomainRowWithId {
    fn try_into_domain(self) -> Result<Domain, DbError> {
        let status: DomainStatus = serde_json::from_value(self.status)
            .map_err(|e| DbError::Decode(format!("domain status: {e}")))?;
        Ok(Domain {
            key: parse_key(&self.record_id)?,
            domain: self.domain,
            hash: self.hash,
            status,
            archived: self.archived,
            selectors: self.selectors,
            last_ran: self.last_ran,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn into_domains(rows: Vec<DomainRowWithId>) -> TrackerResult<Vec<Domain>> {
    let domains = rows
        .into_iter()
        .map(DomainRowWithId::try_into_domain)
        .collect::<Result<Vec<_>, DbError>>()?;
    Ok(domains)
}

/// SurrealDB implementation of the Domain repository.
pub struct SurrealDomainRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealDomainRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealDomainRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> DomainRepository for SurrealDomainRepository<C> {
    async fn get_by_key(&self, key: Uuid) -> TrackerResult<Option<Domain>> {
        let mut result = self
            .db
            .query(format!("{SELECT_DOMAIN} WHERE id = type::record('domain', $id)"))
            .bind(("id", key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DomainRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_domains(rows)?.into_iter().next())
    }

    async fn get_by_name(&self, domain: &str) -> TrackerResult<Option<Domain>> {
        let mut result = self
            .db
            .query(format!("{SELECT_DOMAIN} WHERE domain = $domain"))
            .bind(("domain", clean_domain_name(domain)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DomainRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_domains(rows)?.into_iter().next())
    }

    async fn get_many(&self, keys: &[Uuid]) -> TrackerResult<Vec<Domain>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = keys.iter().map(Uuid::to_string).collect();
        let mut result = self
            .db
            .query(format!("{SELECT_DOMAIN} WHERE meta::id(id) INSIDE $ids"))
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DomainRowWithId> = result.take(0).map_err(DbError::from)?;
        into_domains(rows)
    }

    async fn get_many_by_name(&self, domains: &[String]) -> TrackerResult<Vec<Domain>> {
        if domains.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<String> = domains.iter().map(|d| clean_domain_name(d)).collect();
        let mut result = self
            .db
            .query(format!("{SELECT_DOMAIN} WHERE domain INSIDE $names"))
            .bind(("names", names))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DomainRowWithId> = result.take(0).map_err(DbError::from)?;
        into_domains(rows)
    }

    async fn is_favourite(&self, user_key: Uuid, domain_key: Uuid) -> TrackerResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM favourite \
                 WHERE in = type::record('user', $user) \
                 AND out = type::record('domain', $domain) GROUP ALL",
            )
            .bind(("user", user_key.to_string()))
            .bind(("domain", domain_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}
