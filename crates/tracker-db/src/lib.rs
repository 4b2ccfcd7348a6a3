//! Tracker Database: SurrealDB connection management, schema,
//! transactions, repositories and request-scoped loaders.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - The transaction engine ([`SurrealTransactionEngine`])
//! - Read repositories for the `tracker-core` traits
//! - Write statements registered as transaction steps ([`statement`])
//! - Batching loaders ([`loader::Loaders`])
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod loader;
pub mod repository;
mod schema;
pub mod statement;
mod transaction;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{latest_version, run_migrations};
pub use transaction::{SurrealTransaction, SurrealTransactionEngine};
