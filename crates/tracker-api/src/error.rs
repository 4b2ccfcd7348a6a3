//! Errors raised by post-commit collaborators.

use thiserror::Error;
use tracker_core::error::TrackerError;

/// A notification or publish that could not be delivered. Never reaches
/// the client: the pipeline logs it and carries on.
#[derive(Debug, Error)]
pub enum SideEffectError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Log an infrastructure fault and replace it with the generic
/// client-facing "Unable to X" error.
pub(crate) trait OrUnableTo<T> {
    fn or_unable_to(self, action: &str) -> Result<T, TrackerError>;
}

impl<T, E: std::fmt::Display> OrUnableTo<T> for Result<T, E> {
    fn or_unable_to(self, action: &str) -> Result<T, TrackerError> {
        self.map_err(|e| {
            tracing::error!(error = %e, action, "Infrastructure fault");
            TrackerError::unable_to(action)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faults_become_generic() {
        let result: Result<(), String> = Err("connection reset".into());
        let err = result.or_unable_to("remove domain").unwrap_err();
        assert_eq!(err.to_string(), "Unable to remove domain. Please try again.");
    }
}
