//! Schema definitions and migration runner for SurrealDB.
//!
//! Vertex tables the mutation core writes are SCHEMAFULL. Record IDs are
//! UUID strings. Enums are stored as strings with ASSERT constraints.
//! Scan-result tables are owned by the scanner workers and stay
//! SCHEMALESS; the core only deletes from them.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "edge_uniqueness",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: vertices, edges and scan data
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD user_name ON TABLE user TYPE string;
DEFINE FIELD display_name ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD preferred_lang ON TABLE user TYPE string \
    ASSERT $value IN ['english', 'french'];
DEFINE FIELD email_validated ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD phone_validated ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD tfa_send_method ON TABLE user TYPE string DEFAULT 'none' \
    ASSERT $value IN ['none', 'email', 'phone'];
DEFINE FIELD failed_login_attempts ON TABLE user TYPE int DEFAULT 0;
DEFINE FIELD refresh_id ON TABLE user TYPE option<string>;
DEFINE FIELD refresh_expires_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD remember_me ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD tfa_code ON TABLE user TYPE option<string>;
DEFINE FIELD phone_details ON TABLE user TYPE option<string>;
DEFINE FIELD insider_user ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_user_name ON TABLE user \
    COLUMNS user_name UNIQUE;

-- =======================================================================
-- Organizations (bilingual detail block flattened per language)
-- =======================================================================
DEFINE TABLE organization SCHEMAFULL;
DEFINE FIELD verified ON TABLE organization TYPE bool DEFAULT false;
DEFINE FIELD externally_managed ON TABLE organization TYPE bool \
    DEFAULT false;
DEFINE FIELD external_id ON TABLE organization TYPE option<string>;
DEFINE FIELD slug_en ON TABLE organization TYPE string;
DEFINE FIELD slug_fr ON TABLE organization TYPE string;
DEFINE FIELD acronym_en ON TABLE organization TYPE string;
DEFINE FIELD acronym_fr ON TABLE organization TYPE string;
DEFINE FIELD name_en ON TABLE organization TYPE string;
DEFINE FIELD name_fr ON TABLE organization TYPE string;
DEFINE FIELD zone_en ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD zone_fr ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD sector_en ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD sector_fr ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD country_en ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD country_fr ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD province_en ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD province_fr ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD city_en ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD city_fr ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD created_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_organization_slug_en ON TABLE organization \
    COLUMNS slug_en UNIQUE;
DEFINE INDEX idx_organization_slug_fr ON TABLE organization \
    COLUMNS slug_fr UNIQUE;

-- =======================================================================
-- Domains
-- =======================================================================
DEFINE TABLE domain SCHEMAFULL;
DEFINE FIELD domain ON TABLE domain TYPE string;
DEFINE FIELD hash ON TABLE domain TYPE string;
DEFINE FIELD status ON TABLE domain TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD archived ON TABLE domain TYPE bool DEFAULT false;
DEFINE FIELD selectors ON TABLE domain TYPE array<string> DEFAULT [];
DEFINE FIELD last_ran ON TABLE domain TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE domain TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE domain TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_domain_domain ON TABLE domain COLUMNS domain UNIQUE;

-- =======================================================================
-- Organization summaries (one row per organization per period)
-- =======================================================================
DEFINE TABLE organization_summary SCHEMALESS;
DEFINE INDEX idx_organization_summary_org ON TABLE organization_summary \
    COLUMNS organization;

-- =======================================================================
-- Audit Log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD timestamp ON TABLE audit_log TYPE string;
DEFINE FIELD initiatedBy ON TABLE audit_log TYPE object FLEXIBLE;
DEFINE FIELD action ON TABLE audit_log TYPE string \
    ASSERT $value IN ['add', 'remove', 'update', 'create', 'delete', \
    'export'];
DEFINE FIELD target ON TABLE audit_log TYPE object FLEXIBLE;
DEFINE FIELD status ON TABLE audit_log TYPE string \
    ASSERT $value IN ['success', 'failure', 'denied'];
DEFINE FIELD reason ON TABLE audit_log TYPE option<string>;
DEFINE INDEX idx_audit_timestamp ON TABLE audit_log COLUMNS timestamp;

-- =======================================================================
-- Scan results (written by scanner workers)
-- =======================================================================
DEFINE TABLE dmarc_summary SCHEMALESS;
DEFINE TABLE web SCHEMALESS;
DEFINE TABLE web_scan SCHEMALESS;
DEFINE TABLE dns SCHEMALESS;
DEFINE TABLE selector SCHEMALESS;

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- Organization -> User role assignment
DEFINE TABLE affiliation TYPE RELATION SCHEMAFULL;
DEFINE FIELD permission ON TABLE affiliation TYPE string \
    ASSERT $value IN ['pending', 'user', 'admin', 'owner', 'super_admin'];

-- Organization -> Domain responsibility
DEFINE TABLE claim TYPE RELATION SCHEMAFULL;
DEFINE FIELD tags ON TABLE claim TYPE array<string> DEFAULT [];
DEFINE FIELD hidden ON TABLE claim TYPE bool DEFAULT false;
DEFINE FIELD asset_state ON TABLE claim TYPE string DEFAULT 'approved' \
    ASSERT $value IN ['approved', 'dependency', 'monitor-only', \
    'candidate', 'requires-investigation'];
DEFINE FIELD first_seen ON TABLE claim TYPE string;

-- Organization -> Domain DMARC aggregation
DEFINE TABLE ownership TYPE RELATION SCHEMAFULL;

-- User -> Domain bookmark
DEFINE TABLE favourite TYPE RELATION SCHEMAFULL;

-- Domain -> scan data
DEFINE TABLE domains_to_dmarc_summaries TYPE RELATION SCHEMALESS;
DEFINE TABLE domains_web TYPE RELATION SCHEMALESS;
DEFINE TABLE web_to_web_scans TYPE RELATION SCHEMALESS;
DEFINE TABLE domains_dns TYPE RELATION SCHEMALESS;
DEFINE TABLE domains_to_selectors TYPE RELATION SCHEMALESS;
";

// -----------------------------------------------------------------------
// Schema v2: at most one edge per pair
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE INDEX idx_affiliation_pair ON TABLE affiliation \
    COLUMNS in, out UNIQUE;
DEFINE INDEX idx_claim_pair ON TABLE claim COLUMNS in, out UNIQUE;
DEFINE INDEX idx_ownership_domain ON TABLE ownership COLUMNS out UNIQUE;
DEFINE INDEX idx_favourite_pair ON TABLE favourite COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn every_edge_table_is_a_relation() {
        for edge in ["affiliation", "claim", "ownership", "favourite"] {
            assert!(
                SCHEMA_V1.contains(&format!("DEFINE TABLE {edge} TYPE RELATION")),
                "{edge} must be a relation table"
            );
        }
    }
}
