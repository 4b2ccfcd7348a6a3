//! Audit log append.

use tracker_core::error::{TrackerError, TrackerResult};
use tracker_core::models::audit::CreateAuditLogEntry;
use tracker_core::transaction::Statement;
use uuid::Uuid;

/// Insert one immutable audit record with a server-generated timestamp.
pub fn insert(key: Uuid, timestamp: &str, entry: &CreateAuditLogEntry) -> TrackerResult<Statement> {
    let encode = |value: serde_json::Result<serde_json::Value>| {
        value.map_err(|e| TrackerError::Internal(format!("audit entry encoding: {e}")))
    };
    let initiated_by = encode(serde_json::to_value(&entry.initiated_by))?;
    let target = encode(serde_json::to_value(&entry.target))?;
    let action = entry.action.as_str();
    let status = encode(serde_json::to_value(entry.status))?;

    let reason_clause = if entry.reason.is_some() {
        "reason = $reason"
    } else {
        "reason = NONE"
    };
    let sql = format!(
        "CREATE type::record('audit_log', $id) SET timestamp = $timestamp, \
         initiatedBy = $initiated_by, action = $action, target = $target, \
         status = $status, {reason_clause}"
    );
    let mut statement = Statement::new(sql)
        .bind("id", key.to_string())
        .bind("timestamp", timestamp)
        .bind("initiated_by", initiated_by)
        .bind("action", action)
        .bind("target", target)
        .bind("status", status);
    if let Some(reason) = &entry.reason {
        statement = statement.bind("reason", reason.clone());
    }
    Ok(statement)
}
