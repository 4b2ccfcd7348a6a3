//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! Read-only: records are appended through the transaction engine and
//! the table forbids update and delete.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracker_core::error::TrackerResult;
use tracker_core::models::audit::{AuditLogEntry, AuditStatus, AuditTarget, InitiatedBy};
use tracker_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};

use super::parse_key;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditLogRow {
    record_id: String,
    timestamp: String,
    initiated_by: serde_json::Value,
    action: String,
    target: serde_json::Value,
    status: String,
    reason: Option<String>,
}

impl AuditLogRow {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let decode = |e: serde_json::Error| DbError::Decode(format!("audit log: {e}"));
        let initiated_by: InitiatedBy = serde_json::from_value(self.initiated_by).map_err(decode)?;
        let target: AuditTarget = serde_json::from_value(self.target).map_err(decode)?;
        let action = serde_json::from_value(serde_json::Value::String(self.action)).map_err(decode)?;
        let status: AuditStatus =
            serde_json::from_value(serde_json::Value::String(self.status)).map_err(decode)?;
        Ok(AuditLogEntry {
            key: parse_key(&self.record_id)?,
            timestamp: self.timestamp,
            initiated_by,
            action,
            target,
            status,
            reason: self.reason,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the AuditLog repository.
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealAuditLogRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> TrackerResult<PaginatedResult<AuditLogEntry>> {
        let mut conditions = Vec::new();
        if filter.initiated_by.is_some() {
            conditions.push("initiatedBy.id = $initiated_by");
        }
        if filter.action.is_some() {
            conditions.push("action = $action");
        }
        if filter.resource_type.is_some() {
            conditions.push("target.resourceType = $resource_type");
        }
        if filter.organization.is_some() {
            conditions.push("target.organization.id = $organization");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT count() AS total FROM audit_log{where_clause} GROUP ALL");
        let list_sql = format!(
            "SELECT meta::id(id) AS record_id, timestamp, initiatedBy AS initiated_by, \
             action, target, status, reason FROM audit_log{where_clause} \
             ORDER BY timestamp DESC LIMIT $limit START $offset"
        );

        let mut builder = self
            .db
            .query(&count_sql)
            .query(&list_sql)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(user) = filter.initiated_by {
            builder = builder.bind(("initiated_by", user.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action.as_str()));
        }
        if let Some(resource_type) = filter.resource_type {
            let value = serde_json::to_value(resource_type)
                .map_err(|e| DbError::Decode(e.to_string()))?;
            builder = builder.bind(("resource_type", value));
        }
        if let Some(org) = filter.organization {
            builder = builder.bind(("organization", org.to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<AuditLogRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(AuditLogRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
