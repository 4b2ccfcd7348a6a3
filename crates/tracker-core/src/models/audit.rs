//! Audit log domain model.
//!
//! The persisted record shape is stable: field names are serialized in
//! camelCase (`initiatedBy`, `resourceType`, `updatedProperties`, ...).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::Permission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Add,
    Remove,
    Update,
    Create,
    Delete,
    Export,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Add => "add",
            AuditAction::Remove => "remove",
            AuditAction::Update => "update",
            AuditAction::Create => "create",
            AuditAction::Delete => "delete",
            AuditAction::Export => "export",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    User,
    Org,
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    #[default]
    Success,
    Failure,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedBy {
    pub id: Uuid,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Permission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditOrganization {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedProperty {
    pub name: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
}

impl UpdatedProperty {
    pub fn new(
        name: impl Into<String>,
        old_value: impl Into<serde_json::Value>,
        new_value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTarget {
    /// Human-readable identifier of the affected resource (user name,
    /// organization name, domain name).
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<AuditOrganization>,
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated_properties: Vec<UpdatedProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub key: Uuid,
    /// Server-generated ISO-8601 timestamp.
    pub timestamp: String,
    pub initiated_by: InitiatedBy,
    pub action: AuditAction,
    pub target: AuditTarget,
    pub status: AuditStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Input for appending an audit record. The timestamp and key are
/// assigned by the writer.
#[derive(Debug, Clone)]
pub struct CreateAuditLogEntry {
    pub initiated_by: InitiatedBy,
    pub action: AuditAction,
    pub target: AuditTarget,
    pub status: AuditStatus,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_serializes_in_camel_case() {
        let target = AuditTarget {
            resource: "canada.ca".into(),
            organization: None,
            resource_type: ResourceType::Domain,
            updated_properties: vec![UpdatedProperty::new("archived", false, true)],
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["resourceType"], "domain");
        assert_eq!(json["updatedProperties"][0]["oldValue"], false);
        assert!(json.get("organization").is_none());
    }
}
