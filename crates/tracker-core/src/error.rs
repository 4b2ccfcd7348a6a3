//! Error types for the tracker system.
//!
//! [`TrackerError`] is the infrastructure channel: anything returned
//! through it is an unexpected fault (or a failed gate) and surfaces to
//! the client as a top-level error. Expected business-rule violations
//! travel through [`crate::mutation::MutationError`] instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    /// A transaction step or commit failed. The message is the generic
    /// client-facing text; the cause has already been logged.
    #[error("{0}")]
    Transaction(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }

    pub fn authorization(reason: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            reason: reason.into(),
        }
    }

    /// Generic "Unable to X. Please try again." fault used after an
    /// infrastructure failure has been logged.
    pub fn unable_to(action: &str) -> Self {
        Self::Transaction(format!("Unable to {action}. Please try again."))
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unable_to_message_is_generic() {
        let err = TrackerError::unable_to("invite user");
        assert_eq!(err.to_string(), "Unable to invite user. Please try again.");
    }
}
