//! Event-bus publishing for the scan workers.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::error::SideEffectError;

/// Channel the scan dispatcher listens on.
pub const SCAN_REQUESTS: &str = "scans.requests";
/// Channel feeding new domains to external attack-surface discovery.
pub const ADD_DOMAIN_TO_EASM: &str = "scans.add_domain_to_easm";

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: Value) -> Result<(), SideEffectError>;
}

/// Logs publishes without a broker.
#[derive(Debug, Default, Clone)]
pub struct TracingPublisher;

#[async_trait]
impl Publisher for TracingPublisher {
    async fn publish(&self, channel: &str, payload: Value) -> Result<(), SideEffectError> {
        info!(channel, %payload, "Published message");
        Ok(())
    }
}
