//! Affiliation, claim, ownership and favourite edge writes.
//!
//! `RELATE` endpoints are inlined as `table:\`uuid\`` record IDs; the
//! keys are always generated UUIDs, never user input.

use tracker_core::models::affiliation::ClaimAttributes;
use tracker_core::models::domain::AssetState;
use tracker_core::models::permission::Permission;
use tracker_core::transaction::Statement;
use uuid::Uuid;

pub fn relate_affiliation(org_key: Uuid, user_key: Uuid, permission: Permission) -> Statement {
    Statement::new(format!(
        "RELATE organization:`{org_key}` -> affiliation -> user:`{user_key}` \
         SET permission = $permission"
    ))
    .bind("permission", permission.as_str())
}

/// Overwrite the permission on an existing edge, keyed by the edge.
/// Relation records cannot be upserted, so a missing edge is a no-op.
pub fn set_affiliation_permission(edge_key: &str, permission: Permission) -> Statement {
    Statement::new(
        "UPDATE type::record('affiliation', $key) SET permission = $permission",
    )
    .bind("key", edge_key)
    .bind("permission", permission.as_str())
}

pub fn delete_affiliation(org_key: Uuid, user_key: Uuid) -> Statement {
    Statement::new(
        "DELETE affiliation WHERE in = type::record('organization', $org) \
         AND out = type::record('user', $user)",
    )
    .bind("org", org_key.to_string())
    .bind("user", user_key.to_string())
}

pub fn relate_claim(
    org_key: Uuid,
    domain_key: Uuid,
    attributes: &ClaimAttributes,
    first_seen: &str,
) -> Statement {
    Statement::new(format!(
        "RELATE organization:`{org_key}` -> claim -> domain:`{domain_key}` \
         SET tags = $tags, hidden = $hidden, asset_state = $asset_state, \
         first_seen = $first_seen"
    ))
    .bind("tags", attributes.tags.clone())
    .bind("hidden", attributes.hidden)
    .bind("asset_state", attributes.asset_state.as_str())
    .bind("first_seen", first_seen)
}

/// Claim attribute changes. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ClaimChanges {
    pub tags: Option<Vec<String>>,
    pub hidden: Option<bool>,
    pub asset_state: Option<AssetState>,
}

pub fn update_claim(org_key: Uuid, domain_key: Uuid, changes: &ClaimChanges) -> Option<Statement> {
    let mut sets = Vec::new();
    if changes.tags.is_some() {
        sets.push("tags = $tags");
    }
    if changes.hidden.is_some() {
        sets.push("hidden = $hidden");
    }
    if changes.asset_state.is_some() {
        sets.push("asset_state = $asset_state");
    }
    if sets.is_empty() {
        return None;
    }

    let sql = format!(
        "UPDATE claim SET {} WHERE in = type::record('organization', $org) \
         AND out = type::record('domain', $domain)",
        sets.join(", ")
    );
    let mut statement = Statement::new(sql)
        .bind("org", org_key.to_string())
        .bind("domain", domain_key.to_string());
    if let Some(tags) = &changes.tags {
        statement = statement.bind("tags", tags.clone());
    }
    if let Some(hidden) = changes.hidden {
        statement = statement.bind("hidden", hidden);
    }
    if let Some(state) = changes.asset_state {
        statement = statement.bind("asset_state", state.as_str());
    }
    Some(statement)
}

pub fn delete_claim(org_key: Uuid, domain_key: Uuid) -> Statement {
    Statement::new(
        "DELETE claim WHERE in = type::record('organization', $org) \
         AND out = type::record('domain', $domain)",
    )
    .bind("org", org_key.to_string())
    .bind("domain", domain_key.to_string())
}

pub fn relate_ownership(org_key: Uuid, domain_key: Uuid) -> Statement {
    Statement::new(format!(
        "RELATE organization:`{org_key}` -> ownership -> domain:`{domain_key}`"
    ))
}

pub fn relate_favourite(user_key: Uuid, domain_key: Uuid) -> Statement {
    Statement::new(format!(
        "RELATE user:`{user_key}` -> favourite -> domain:`{domain_key}`"
    ))
}

pub fn delete_favourite(user_key: Uuid, domain_key: Uuid) -> Statement {
    Statement::new(
        "DELETE favourite WHERE in = type::record('user', $user) \
         AND out = type::record('domain', $domain)",
    )
    .bind("user", user_key.to_string())
    .bind("domain", domain_key.to_string())
}
