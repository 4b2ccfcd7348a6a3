//! SurrealDB implementation of [`OrganizationRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracker_core::error::TrackerResult;
use tracker_core::models::affiliation::DomainClaimCount;
use tracker_core::models::organization::{OrgDetails, Organization};
use tracker_core::repository::OrganizationRepository;
use uuid::Uuid;

use super::parse_key;
use crate::error::DbError;

const SELECT_ORGANIZATION: &str = "SELECT meta::id(id) AS record_id, * FROM organization";

#[derive(Debug, SurrealValue)]
struct OrganizationRowWithId {
    record_id: String,
    verified: bool,
    externally_managed: bool,
    external_id: Option<String>,
    slug_en: String,
    slug_fr: String,
    acronym_en: String,
    acronym_fr: String,
    name_en: String,
    name_fr: String,
    zone_en: String,
    zone_fr: String,
    sector_en: String,
    sector_fr: String,
    country_en: String,
    country_fr: String,
    province_en: String,
    province_fr: String,
    city_en: String,
    city_fr: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrganizationRowWithId {
    fn try_into_organization(self) -> Result<Organization, DbError> {
        Ok(Organization {
            key: parse_key(&self.record_id)?,
            verified: self.verified,
            externally_managed: self.externally_managed,
            external_id: self.external_id,
            en: OrgDetails {
                slug: self.slug_en,
                acronym: self.acronym_en,
                name: self.name_en,
                zone: self.zone_en,
                sector: self.sector_en,
                country: self.country_en,
                province: self.province_en,
                city: self.city_en,
            },
            fr: OrgDetails {
                slug: self.slug_fr,
                acronym: self.acronym_fr,
                name: self.name_fr,
                zone: self.zone_fr,
                sector: self.sector_fr,
                country: self.country_fr,
                province: self.province_fr,
                city: self.city_fr,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct ClaimCountRow {
    domain_key: String,
    claim_count: u64,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn into_organizations(rows: Vec<OrganizationRowWithId>) -> TrackerResult<Vec<Organization>> {
    let orgs = rows
        .into_iter()
        .map(OrganizationRowWithId::try_into_organization)
        .collect::<Result<Vec<_>, DbError>>()?;
    Ok(orgs)
}

/// SurrealDB implementation of the Organization repository.
pub struct SurrealOrganizationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealOrganizationRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealOrganizationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> OrganizationRepository for SurrealOrganizationRepository<C> {
    async fn get_by_key(&self, key: Uuid) -> TrackerResult<Option<Organization>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_ORGANIZATION} WHERE id = type::record('organization', $id)"
            ))
            .bind(("id", key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_organizations(rows)?.into_iter().next())
    }

    async fn get_by_slug(&self, slug: &str) -> TrackerResult<Option<Organization>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_ORGANIZATION} WHERE slug_en = $slug OR slug_fr = $slug"
            ))
            .bind(("slug", slug.trim().to_lowercase()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_organizations(rows)?.into_iter().next())
    }

    async fn get_many(&self, keys: &[Uuid]) -> TrackerResult<Vec<Organization>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = keys.iter().map(Uuid::to_string).collect();
        let mut result = self
            .db
            .query(format!("{SELECT_ORGANIZATION} WHERE meta::id(id) INSIDE $ids"))
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRowWithId> = result.take(0).map_err(DbError::from)?;
        into_organizations(rows)
    }

    async fn get_many_by_slug(&self, slugs: &[String]) -> TrackerResult<Vec<Organization>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        let slugs: Vec<String> = slugs.iter().map(|s| s.trim().to_lowercase()).collect();
        let mut result = self
            .db
            .query(format!(
                "{SELECT_ORGANIZATION} WHERE slug_en INSIDE $slugs OR slug_fr INSIDE $slugs"
            ))
            .bind(("slugs", slugs))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRowWithId> = result.take(0).map_err(DbError::from)?;
        into_organizations(rows)
    }

    async fn name_in_use(
        &self,
        name_en: &str,
        name_fr: &str,
        exclude: Option<Uuid>,
    ) -> TrackerResult<bool> {
        let exclude_clause = if exclude.is_some() {
            " AND meta::id(id) != $exclude"
        } else {
            ""
        };
        let query = format!(
            "SELECT count() AS total FROM organization \
             WHERE (string::lowercase(name_en) = $name_en \
             OR string::lowercase(name_fr) = $name_fr){exclude_clause} GROUP ALL"
        );
        let mut builder = self
            .db
            .query(&query)
            .bind(("name_en", name_en.trim().to_lowercase()))
            .bind(("name_fr", name_fr.trim().to_lowercase()));
        if let Some(exclude) = exclude {
            builder = builder.bind(("exclude", exclude.to_string()));
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn domain_claim_counts(&self, org_key: Uuid) -> TrackerResult<Vec<DomainClaimCount>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(out) AS domain_key, \
                 count(SELECT id FROM claim WHERE out = $parent.out) AS claim_count \
                 FROM claim WHERE in = type::record('organization', $org)",
            )
            .bind(("org", org_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClaimCountRow> = result.take(0).map_err(DbError::from)?;
        let counts = rows
            .into_iter()
            .map(|row| {
                Ok(DomainClaimCount {
                    domain_key: parse_key(&row.domain_key)?,
                    claim_count: row.claim_count,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(counts)
    }
}
