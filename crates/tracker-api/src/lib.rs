//! Tracker API: the permission-gated mutation pipeline.
//!
//! Every mutation runs the same sequence: gate the caller, cleanse the
//! input, resolve the referenced entities through the request loaders,
//! authorize against the affiliation graph, run business checks, write
//! through one transaction, then fire post-commit effects (loader
//! invalidation, notifications, scan publishes, audit records).

pub mod audit;
pub mod context;
pub mod error;
pub mod mutation;
pub mod notify;
pub mod payload;
pub mod publish;
mod service;

pub use audit::AuditLogger;
pub use context::RequestContext;
pub use error::SideEffectError;
pub use notify::{Notification, Notifier, TracingNotifier};
pub use publish::{Publisher, TracingPublisher};
pub use service::Mutations;
