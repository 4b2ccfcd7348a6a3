//! Best-effort audit trail.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, error};
use tracker_core::models::audit::CreateAuditLogEntry;
use tracker_core::transaction::{Transaction, TransactionEngine};
use tracker_db::statement;
use uuid::Uuid;

/// Appends audit records in their own transaction, after the primary
/// mutation has committed. Failures are logged and swallowed so they
/// never undo or fail the mutation being recorded.
pub struct AuditLogger<E> {
    engine: Arc<E>,
}

impl<E> Clone for AuditLogger<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: TransactionEngine> AuditLogger<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    pub async fn log_activity(&self, entry: CreateAuditLogEntry) {
        let action = entry.action.as_str();
        let key = Uuid::new_v4();
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let step = match statement::audit::insert(key, &timestamp, &entry) {
            Ok(step) => step,
            Err(e) => {
                error!(error = %e, action, "Unable to encode audit log record");
                return;
            }
        };

        let mut tx = match self.engine.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(error = %e, action, "Unable to open audit log transaction");
                return;
            }
        };

        if let Err(e) = tx.step(step).await {
            error!(error = %e, action, "Transaction step error while logging activity");
            tx.abort().await;
            return;
        }

        if let Err(e) = tx.commit().await {
            error!(error = %e, action, "Transaction commit error while logging activity");
            tx.abort().await;
            return;
        }

        debug!(%key, action, "Activity logged");
    }
}
